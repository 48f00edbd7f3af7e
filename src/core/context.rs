//! Typed description of the change a deployment goal runs for.
//!
//! The host builds one [`ExecutionContext`] per run; the pipeline, its
//! transforms and their predicates only read it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identity of the repository the working tree was checked out from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl RepoRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            branch: None,
            sha: None,
        }
    }

    /// `owner/name` when the owner is known, otherwise the bare name.
    pub fn slug(&self) -> String {
        match &self.owner {
            Some(owner) if !owner.is_empty() => format!("{}/{}", owner, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Deployment tier a run targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvironmentTag {
    /// No deployment environment.
    Independent,
    Staging,
    Production,
    /// Any other tier, conventionally shaped `<number>-<suffix>`.
    Custom(String),
}

impl EnvironmentTag {
    pub fn as_str(&self) -> &str {
        match self {
            EnvironmentTag::Independent => "independent",
            EnvironmentTag::Staging => "staging",
            EnvironmentTag::Production => "production",
            EnvironmentTag::Custom(tag) => tag,
        }
    }

    /// Suffix of a custom tag: the second `-`-separated token, or the whole
    /// tag when it has none.
    pub fn custom_suffix(tag: &str) -> &str {
        match tag.split('-').nth(1) {
            Some(suffix) if !suffix.is_empty() => suffix,
            _ => tag,
        }
    }
}

impl FromStr for EnvironmentTag {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let tag = raw.trim().trim_end_matches('/');
        if tag.is_empty() {
            return Err(Error::validation_invalid_argument(
                "environment",
                "Environment tag cannot be empty",
                None,
                Some(vec![
                    "independent".to_string(),
                    "staging".to_string(),
                    "production".to_string(),
                ]),
            ));
        }

        Ok(match tag.to_ascii_lowercase().as_str() {
            "independent" | "0-code" => EnvironmentTag::Independent,
            "staging" | "1-staging" => EnvironmentTag::Staging,
            "production" | "2-prod" => EnvironmentTag::Production,
            _ => EnvironmentTag::Custom(tag.to_string()),
        })
    }
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EnvironmentTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EnvironmentTag {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: Error| serde::de::Error::custom(e.message))
    }
}

/// Immutable bundle describing one goal run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub repo: RepoRef,
    pub environment: EnvironmentTag,
    /// Container image produced for the change, when the host knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ExecutionContext {
    pub fn new(repo: RepoRef, environment: EnvironmentTag) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            repo,
            environment,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
