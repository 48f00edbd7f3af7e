use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ErrorCode};
use crate::goal::GoalDetails;

/// A link the host shows next to the goal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalUrl {
    pub label: String,
    pub url: String,
}

impl ExternalUrl {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailure {
    pub code: i32,
    #[serde(serialize_with = "serialize_error_code")]
    pub kind: ErrorCode,
    pub description: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

fn serialize_error_code<S: serde::Serializer>(
    code: &ErrorCode,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(code.as_str())
}

/// Terminal value of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    Success { external_urls: Vec<ExternalUrl> },
    Failure(PipelineFailure),
}

/// Wire shape handed to the host's reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_urls: Vec<ExternalUrl>,
}

impl PipelineResult {
    pub fn success(external_urls: Vec<ExternalUrl>) -> Self {
        PipelineResult::Success { external_urls }
    }

    /// Failure described in the goal's terms, keeping the error's code.
    pub fn from_error(err: Error, goal: &GoalDetails) -> Self {
        PipelineResult::Failure(PipelineFailure {
            code: err.result_code(),
            kind: err.code,
            description: goal.failure(&err.message),
            details: err.details,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }

    pub fn code(&self) -> i32 {
        match self {
            PipelineResult::Success { .. } => 0,
            PipelineResult::Failure(failure) => failure.code,
        }
    }

    pub fn external_urls(&self) -> &[ExternalUrl] {
        match self {
            PipelineResult::Success { external_urls } => external_urls,
            PipelineResult::Failure(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineResult::Success { .. } => None,
            PipelineResult::Failure(failure) => Some(failure),
        }
    }

    pub fn payload(&self) -> ResultPayload {
        match self {
            PipelineResult::Success { external_urls } => ResultPayload {
                code: 0,
                description: None,
                external_urls: external_urls.clone(),
            },
            PipelineResult::Failure(failure) => ResultPayload {
                code: failure.code,
                description: Some(failure.description.clone()),
                external_urls: Vec::new(),
            },
        }
    }
}
