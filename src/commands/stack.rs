use clap::Args;
use serde::Serialize;

use stackup::context::EnvironmentTag;
use stackup::goal::GoalDetails;
use stackup::{defaults, stack};

use super::CmdResult;

#[derive(Args)]
pub struct StackArgs {
    /// Repository name
    pub repo: String,

    /// Environment tag (independent, staging, production or <n>-<suffix>)
    pub env: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutput {
    command: String,
    repo: String,
    environment: EnvironmentTag,
    stack: String,
    goal: String,
}

pub fn run(args: StackArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<StackOutput> {
    let environment: EnvironmentTag = args.env.parse()?;
    let config = defaults::load_config().provision;
    let goal = GoalDetails::for_environment(&config.tool, environment.clone());

    Ok((
        StackOutput {
            command: "stack".to_string(),
            stack: stack::resolve(&args.repo, &environment),
            repo: args.repo,
            environment,
            goal: goal.display_name,
        },
        0,
    ))
}
