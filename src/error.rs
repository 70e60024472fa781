use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised while building or reconfiguring the synth.
///
/// Note on/off never produces one of these: operations on missing voice
/// keys are defined no-ops.
#[derive(Debug, Error)]
pub enum Error {
    /// Double initialization, late or duplicate registration, bad config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An effect unit failed to produce a usable input/output pair.
    #[error("module `{name}` failed to initialize: {reason}")]
    ModuleInitialization { name: String, reason: String },

    #[error("unknown or freed node {0:?}")]
    UnknownNode(NodeId),

    #[error("connecting {from:?} -> {to:?} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    #[error("{target} has no parameter `{name}`")]
    UnknownParameter { target: String, name: String },

    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue { name: String, reason: String },
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn unknown_param(target: impl Into<String>, name: &str) -> Self {
        Error::UnknownParameter {
            target: target.into(),
            name: name.to_string(),
        }
    }

    pub(crate) fn invalid_value(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
