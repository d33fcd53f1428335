//! Error types for mixer graph operations.
//!
//! Errors only surface from actions running on the audio thread, where the
//! [`CommandQueue`](crate::CommandQueue) logs them and moves on. Transport
//! calls made by applications report failure through plain return values
//! instead.

use crate::backend::BackendError;
use crate::channel::ChannelKey;

/// Failure of a queued mixer graph action.
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    /// A native backend call failed.
    #[error("backend call failed: {0}")]
    Backend(#[from] BackendError),

    /// The channel was dropped before the action ran.
    #[error("channel {0} no longer exists")]
    ChannelGone(ChannelKey),

    /// The mixer was disposed before the action ran.
    #[error("mixer '{0}' has been disposed")]
    Disposed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn backend_error_converts_and_chains() {
        let err: MixerError = BackendError::InvalidHandle(3).into();
        assert_eq!(err.to_string(), "backend call failed: invalid handle 3");
        assert!(err.source().is_some());
    }

    #[test]
    fn disposed_display() {
        let err = MixerError::Disposed("music".into());
        assert_eq!(err.to_string(), "mixer 'music' has been disposed");
        assert!(err.source().is_none());
    }
}
