//! Role mutation vocabulary shared by the executor and its callers.

mod operation;
mod result;

pub use operation::{OperationKey, RoleAction, RoleOperation};
pub use result::{FailureCause, OperationResult, PreconditionFailure};
