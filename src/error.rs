//! Error types for the bridge.
//!
//! The registration contract leaves almost no room for recoverable failure:
//! an unknown id on update/remove is a benign race handled silently, and the
//! id counters cannot realistically exhaust. What remains is the host loop
//! refusing a subscription, which is fatal to that registration — the bridge
//! has no fallback transport, so the error carries enough context to say
//! which registration died and why.

use core::fmt;
use std::io;
use std::os::fd::RawFd;

/// Error produced by a registration call.
#[derive(Debug)]
pub enum BridgeError {
    /// The host loop failed to create an fd readiness subscription.
    WatchSubscribe {
        /// File descriptor the subscription was for.
        fd: RawFd,
        /// Underlying host-loop error.
        source: io::Error,
    },
    /// The host loop failed to create a periodic timer subscription.
    TimerSubscribe {
        /// Requested interval in milliseconds.
        interval_ms: i64,
        /// Underlying host-loop error.
        source: io::Error,
    },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WatchSubscribe { fd, source } => {
                write!(f, "host loop refused fd watch subscription (fd {fd}): {source}")
            }
            Self::TimerSubscribe {
                interval_ms,
                source,
            } => {
                write!(
                    f,
                    "host loop refused timer subscription ({interval_ms} ms): {source}"
                )
            }
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WatchSubscribe { source, .. } | Self::TimerSubscribe { source, .. } => {
                Some(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = BridgeError::WatchSubscribe {
            fd: 9,
            source: io::Error::new(io::ErrorKind::Other, "loop shut down"),
        };
        let text = err.to_string();
        assert!(text.contains("fd 9"));
        assert!(text.contains("loop shut down"));

        let err = BridgeError::TimerSubscribe {
            interval_ms: 250,
            source: io::Error::new(io::ErrorKind::Other, "no timer slots"),
        };
        let text = err.to_string();
        assert!(text.contains("250 ms"));
    }

    #[test]
    fn source_is_preserved() {
        use std::error::Error as _;
        let err = BridgeError::TimerSubscribe {
            interval_ms: -1,
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(err.source().is_some());
    }
}
