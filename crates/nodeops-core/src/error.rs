//! Error taxonomy and process exit codes.

use thiserror::Error;

use crate::checks::CheckResult;

/// Process exit codes. Values are fixed so calling scripts can branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    BadApiResponse = 3,
    OperationExecutionError = 4,
    TransactionError = 5,
    RevertError = 6,
    BadUserError = 7,
    NodeStateError = 8,
    UnsafeUpdate = 9,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Categorised failures. Anything that is not one of these exits with
/// [`ExitCode::Failure`].
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is not initialized")]
    NotInited,

    #[error("node is already initialized")]
    AlreadyInited,

    #[error(
        "command must be run by the user that initialized the node (uid {expected}), \
         current uid is {actual}"
    )]
    BadUser { expected: u32, actual: u32 },

    #[error("{} preinstall check(s) did not pass", .0.len())]
    PreflightFailed(Vec<CheckResult>),

    #[error("{} postinstall check(s) did not pass", .0.len())]
    PostflightFailed(Vec<CheckResult>),

    #[error("step '{step}' failed: {detail}")]
    StepFailed { step: String, detail: String },

    #[error("command failed (exit {code}): {command}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("cannot measure disk {device}: {detail}")]
    DiskMeasurement { device: String, detail: String },

    #[error("bad response from backend: {detail}")]
    BadApiResponse {
        detail: String,
        payload: Option<serde_json::Value>,
    },

    #[error("update is not safe: {}", .reasons.join(", "))]
    UnsafeUpdate { reasons: Vec<String> },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

impl NodeError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            NodeError::NotInited | NodeError::AlreadyInited => ExitCode::NodeStateError,
            NodeError::BadUser { .. } => ExitCode::BadUserError,
            NodeError::PreflightFailed(_) | NodeError::PostflightFailed(_) => ExitCode::Failure,
            NodeError::StepFailed { .. } | NodeError::CommandFailed { .. } => {
                ExitCode::OperationExecutionError
            }
            NodeError::DiskMeasurement { .. } => ExitCode::OperationExecutionError,
            NodeError::BadApiResponse { .. } => ExitCode::BadApiResponse,
            NodeError::UnsafeUpdate { .. } => ExitCode::UnsafeUpdate,
            NodeError::InvalidParams(_) => ExitCode::Failure,
        }
    }

    /// Probe results carried by a check failure, if any.
    pub fn failed_checks(&self) -> Option<&[CheckResult]> {
        match self {
            NodeError::PreflightFailed(r) | NodeError::PostflightFailed(r) => Some(r),
            _ => None,
        }
    }
}

/// Find the first [`NodeError`] in an error chain.
pub fn find_node_error(err: &anyhow::Error) -> Option<&NodeError> {
    err.chain().find_map(|e| e.downcast_ref::<NodeError>())
}

/// Exit code for an arbitrary error chain.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    find_node_error(err)
        .map(NodeError::exit_code)
        .unwrap_or(ExitCode::Failure)
}
