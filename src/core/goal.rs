use serde::Serialize;

use crate::context::EnvironmentTag;

/// Display metadata for the deployment goal, as the host shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDetails {
    pub name: String,
    pub display_name: String,
    pub working_description: String,
    pub completed_description: String,
    pub failed_description: String,
    pub isolated: bool,
    pub environment: EnvironmentTag,
}

impl GoalDetails {
    /// Metadata for `<tool> up` against the given environment.
    pub fn for_environment(tool: &str, environment: EnvironmentTag) -> Self {
        let display_name = format!("{} up{}", tool, environment_label(&environment));

        Self {
            name: format!("{}-up", tool),
            working_description: format!("{} running", display_name),
            completed_description: format!("{} completed", display_name),
            failed_description: format!("{} failed", display_name),
            display_name,
            isolated: true,
            environment,
        }
    }

    /// Failure description naming the reason, e.g. ``pulumi up `testing` failed (no application found)``.
    pub fn failure(&self, reason: &str) -> String {
        format!("{} ({})", self.failed_description, reason)
    }
}

/// Label appended to the goal name: empty for environment-independent runs.
pub fn environment_label(environment: &EnvironmentTag) -> String {
    match environment {
        EnvironmentTag::Independent => String::new(),
        EnvironmentTag::Staging => " `testing`".to_string(),
        EnvironmentTag::Production => " `production`".to_string(),
        EnvironmentTag::Custom(tag) => format!(" `{}`", EnvironmentTag::custom_suffix(tag)),
    }
}
