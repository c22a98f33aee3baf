//! Provider errors and their classification
//!
//! Every failure inside the provider is a [`ScalewayError`]. Handlers decide
//! what to do with it through [`ScalewayError::kind`], which maps HTTP status
//! codes and structured API error types onto an [`ErrorKind`].

use std::collections::HashMap;
use std::fmt;

use meridian_core::provider::{ProviderError, ResourceAddress};
use serde::Deserialize;
use thiserror::Error;

use crate::locality::LocalityError;

/// One entry of an `invalid_arguments` error
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArgumentDetail {
    #[serde(default)]
    pub argument_name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub help_message: Option<String>,
}

/// Error envelope returned by the cloud API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    /// HTTP status code of the response
    #[serde(skip)]
    pub status: u16,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Current state of the resource, for `transient_state` errors
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub details: Vec<ArgumentDetail>,
    #[serde(default)]
    pub fields: HashMap<String, Vec<String>>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Names of the arguments rejected by an `invalid_arguments` error
    pub fn invalid_arguments(&self) -> impl Iterator<Item = &str> {
        self.details
            .iter()
            .map(|d| d.argument_name.as_str())
            .chain(self.fields.keys().map(String::as_str))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scaleway-sdk: http error {}", self.status)?;
        if !self.error_type.is_empty() {
            write!(f, " {}", self.error_type)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        for detail in &self.details {
            write!(f, " ({}: {})", detail.argument_name, detail.reason)?;
        }
        Ok(())
    }
}

/// Errors raised by the Scaleway provider
#[derive(Debug, Clone, Error)]
pub enum ScalewayError {
    /// Structured error returned by the API, message kept as-is
    #[error("{0}")]
    Api(ApiError),

    /// Connection failures and body read errors
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Locality(#[from] LocalityError),

    /// No scope in the attributes nor in the client defaults
    #[error("{0} not found: set it on the resource or configure a default on the provider")]
    ScopeNotFound(&'static str),

    #[error("timeout waiting for {kind} {id} after {elapsed:?}")]
    Timeout {
        kind: String,
        id: String,
        elapsed: std::time::Duration,
    },

    /// The operation context was cancelled while waiting
    #[error("{0} cancelled")]
    Cancelled(String),

    /// The remote resource reached a state it cannot leave on its own
    #[error("{kind} {id} is in unexpected state {state}")]
    UnexpectedState {
        kind: String,
        id: String,
        state: String,
    },

    /// A data-source lookup found no candidate
    #[error("no {kind} found with name {name}")]
    NotFound { kind: String, name: String },

    /// A data-source lookup by identifier found the resource gone
    #[error("{kind} {id} not found")]
    Gone { kind: String, id: String },

    /// A data-source lookup found several candidates
    #[error(
        "multiple {kind}s found with name {name}: add more filters (project_id, zone or region) to select a single one"
    )]
    AmbiguousMatch { kind: String, name: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("provider configuration error: {0}")]
    Config(String),

    /// Invalid user input detected before any call is made
    #[error("{0}")]
    InvalidInput(String),
}

/// Semantic class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Gone,
    Forbidden,
    PreconditionFailed,
    Conflict,
    RateLimited,
    TransientState,
    InvalidArgument,
    Other,
}

pub type ScalewayResult<T> = Result<T, ScalewayError>;

impl ScalewayError {
    pub fn transport(message: impl fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn ambiguous(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AmbiguousMatch {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Classify the error. Structured error types take precedence over the
    /// status code, so a 409 `transient_state` is a [`ErrorKind::TransientState`].
    pub fn kind(&self) -> ErrorKind {
        let Self::Api(api) = self else {
            return match self {
                Self::NotFound { .. } => ErrorKind::NotFound,
                Self::Gone { .. } => ErrorKind::Gone,
                Self::Locality(_) | Self::InvalidInput(_) => ErrorKind::InvalidArgument,
                _ => ErrorKind::Other,
            };
        };

        match api.error_type.as_str() {
            "transient_state" => return ErrorKind::TransientState,
            "invalid_arguments" => return ErrorKind::InvalidArgument,
            "not_found" => return ErrorKind::NotFound,
            "precondition_failed" => return ErrorKind::PreconditionFailed,
            _ => {}
        }

        match api.status {
            404 => ErrorKind::NotFound,
            410 => ErrorKind::Gone,
            403 => ErrorKind::Forbidden,
            412 => ErrorKind::PreconditionFailed,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            _ => ErrorKind::Other,
        }
    }

    /// 404 and 410
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Gone)
    }

    /// Like [`is_not_found`](Self::is_not_found), also counting 403, for
    /// resources the API reports as forbidden once they are released
    pub fn is_gone_or_forbidden(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::Gone | ErrorKind::Forbidden
        )
    }

    pub fn is_transient_state(&self) -> bool {
        self.kind() == ErrorKind::TransientState
    }

    /// Returns true for an `invalid_arguments` error flagging the `reverse`
    /// field (the reverse DNS record does not resolve to the address yet)
    pub fn is_reverse_invalid_argument(&self) -> bool {
        match self {
            Self::Api(api) if self.kind() == ErrorKind::InvalidArgument => {
                api.invalid_arguments().any(|name| name == "reverse")
            }
            _ => false,
        }
    }

    /// Convert into the error surfaced to the host, keeping the cloud message intact
    pub fn into_provider_error(self, resource: ResourceAddress) -> ProviderError {
        ProviderError::from(self).for_resource(resource)
    }
}

impl From<ApiError> for ScalewayError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

impl From<reqwest::Error> for ScalewayError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ScalewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<ScalewayError> for ProviderError {
    fn from(value: ScalewayError) -> Self {
        let message = value.to_string();
        ProviderError::new(message).with_cause(value)
    }
}
