//! RPC error codes and error type.

use grimoire_core::SessionError;

use crate::types::RpcErrorBody;

/// Invalid or missing parameters, or a frame that is not a request.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Method name not recognized.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";

/// Errors a request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Unknown method.
    #[error("Unknown method: {method}")]
    MethodNotFound {
        /// The method name as received.
        method: String,
    },

    /// Domain failure (not found, duplicate name, ...).
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RpcError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::Session(e) => e.code(),
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}
