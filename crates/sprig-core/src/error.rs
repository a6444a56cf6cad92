use thiserror::Error;

use crate::host::HostError;
use crate::registry::InstanceId;

#[derive(Debug, Error)]
pub enum Error {
    /// A setter fired for an instance that has been unmounted.
    #[error("instance {0:?} has no render context; it is no longer mounted")]
    InvalidContext(InstanceId),
    #[error("no host target to mount into")]
    MissingTarget,
    #[error("state update for instance {0:?} issued while a render is in progress")]
    ReentrantUpdate(InstanceId),
    #[error("patch requested while another render pass is in progress")]
    RenderInProgress,
    /// `previous` was handed to `patch` without ever having been mounted.
    #[error("previous {0} node was never mounted")]
    NotMounted(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
