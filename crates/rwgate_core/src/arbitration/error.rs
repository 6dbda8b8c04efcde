use thiserror::Error;

use crate::arbitration::CallerId;

/// Errors produced by the arbitration layer.
///
/// The lock itself has no failure modes under correct usage; only the
/// timeout-bounded acquisition variants can fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArbitrationError {
    #[error("Arbitration error, timed out waiting for shared access (reader: {0})")]
    SharedAccessTimeout(CallerId),

    #[error("Arbitration error, timed out waiting for exclusive access (writer: {0})")]
    ExclusiveAccessTimeout(CallerId),
}
