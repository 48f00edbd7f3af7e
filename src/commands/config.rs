use clap::{Args, Subcommand};
use serde::Serialize;

use stackup::defaults::{self, StackupConfig};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (merged defaults + file)
    Show {
        /// Show only built-in defaults (ignore stackup.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Store the process-wide access token in provision.token
    SetToken {
        /// Access token for the provisioning tool
        token: String,
    },
    /// Reset configuration to built-in defaults (deletes stackup.json)
    Reset,
    /// Show the path to stackup.json
    Path,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<StackupConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            config: None,
            path: None,
            exists: None,
            deleted: None,
        }
    }
}

pub fn run(args: ConfigArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin),
        ConfigCommand::SetToken { token } => set_token(token),
        ConfigCommand::Reset => reset(),
        ConfigCommand::Path => path(),
    }
}

fn show(builtin: bool) -> CmdResult<ConfigOutput> {
    let config = if builtin {
        StackupConfig::default()
    } else {
        defaults::load_config()
    };

    Ok((
        ConfigOutput {
            config: Some(redacted(config)),
            ..ConfigOutput::new("config.show")
        },
        0,
    ))
}

fn set_token(token: String) -> CmdResult<ConfigOutput> {
    if token.trim().is_empty() {
        return Err(stackup::Error::validation_invalid_argument(
            "token",
            "Token cannot be empty",
            None,
            None,
        ));
    }

    let mut config = defaults::load_config();
    config.provision.token = Some(token);
    defaults::save_config(&config)?;

    Ok((
        ConfigOutput {
            config: Some(redacted(config)),
            path: Some(defaults::config_path()?),
            ..ConfigOutput::new("config.set-token")
        },
        0,
    ))
}

fn reset() -> CmdResult<ConfigOutput> {
    let deleted = defaults::reset_config()?;

    Ok((
        ConfigOutput {
            path: Some(defaults::config_path()?),
            deleted: Some(deleted),
            ..ConfigOutput::new("config.reset")
        },
        0,
    ))
}

fn path() -> CmdResult<ConfigOutput> {
    Ok((
        ConfigOutput {
            path: Some(defaults::config_path()?),
            exists: Some(defaults::config_exists()),
            ..ConfigOutput::new("config.path")
        },
        0,
    ))
}

/// Tokens never leave the process in command output.
fn redacted(mut config: StackupConfig) -> StackupConfig {
    if config.provision.configured_token().is_some() {
        config.provision.token = Some("********".to_string());
    }
    config
}
