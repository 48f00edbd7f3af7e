//! Stack naming: which provisioned instance a run targets.

use crate::context::{EnvironmentTag, ExecutionContext};

/// Map a repository name and environment tag to a stack name.
///
/// | tag           | stack                 |
/// |---------------|-----------------------|
/// | independent   | `repo`                |
/// | staging       | `repo-testing`        |
/// | production    | `repo-production`     |
/// | `<n>-<sfx>`   | `repo-<sfx>`          |
///
/// A custom tag without a hyphen is used whole as the suffix.
pub fn resolve(repository_name: &str, environment: &EnvironmentTag) -> String {
    match environment {
        EnvironmentTag::Independent => repository_name.to_string(),
        EnvironmentTag::Staging => format!("{}-testing", repository_name),
        EnvironmentTag::Production => format!("{}-production", repository_name),
        EnvironmentTag::Custom(tag) => {
            format!("{}-{}", repository_name, EnvironmentTag::custom_suffix(tag))
        }
    }
}

/// Chooses the stack for a run. Hosts override the default naming by
/// supplying their own implementation (closures work too).
pub trait StackNamer: Send + Sync {
    fn stack_name(&self, ctx: &ExecutionContext) -> String;
}

impl<F> StackNamer for F
where
    F: Fn(&ExecutionContext) -> String + Send + Sync,
{
    fn stack_name(&self, ctx: &ExecutionContext) -> String {
        self(ctx)
    }
}

/// The [`resolve`] table applied to the context's repository and environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStackNames;

impl StackNamer for DefaultStackNames {
    fn stack_name(&self, ctx: &ExecutionContext) -> String {
        resolve(&ctx.repo.name, &ctx.environment)
    }
}

/// A fixed stack name regardless of context.
#[derive(Debug, Clone)]
pub struct FixedStack(pub String);

impl StackNamer for FixedStack {
    fn stack_name(&self, _ctx: &ExecutionContext) -> String {
        self.0.clone()
    }
}
