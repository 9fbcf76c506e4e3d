//! Remote builds: assembling the request, following the build while it runs, and streaming its
//! log object out of storage.
mod config;
mod logs;
mod poller;

pub use self::config::*;
pub use self::logs::LogTailer;
pub use self::poller::BuildPoller;
use crate::errors::*;

err_impl! {BuildError,
    #[error("{0}")]
    BuildFailed(String),

    #[error("build {0} was cancelled")]
    Cancelled(String),

    #[error("invalid build request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests;
