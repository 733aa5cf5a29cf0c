//! Readiness state machine for a single channel descriptor
//!
//! Every blocking path goes through [`wait`]: one `poll` over the socket and,
//! when available, the cancellation wake descriptor, bounded by the channel's
//! poll interval. Callers loop while the result is [`Readiness::Waiting`].

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use log::trace;

use super::cancel::Cancellation;
use crate::error::L2capError;

/// Socket events a readiness wait listens for.
const WAIT_EVENTS: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;

/// Result of one readiness wait
#[derive(Debug)]
pub enum Readiness {
    /// Nothing happened within the interval
    Waiting,
    /// A record can be received without blocking
    Ready,
    /// The peer hung up or the socket reports an error condition
    PeerClosed,
    /// The descriptor was closed on this side
    LocallyClosed,
    /// `poll` itself failed
    Error(io::Error),
    /// Cancellation was requested
    Cancelled,
}

impl Readiness {
    /// Classifies the `revents` reported for the socket descriptor.
    pub fn from_revents(revents: libc::c_short) -> Self {
        if revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            Readiness::PeerClosed
        } else if revents & libc::POLLNVAL != 0 {
            Readiness::LocallyClosed
        } else if revents & libc::POLLIN != 0 {
            Readiness::Ready
        } else {
            Readiness::Waiting
        }
    }

    /// True for states that end a receive without reading.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Readiness::Waiting | Readiness::Ready)
    }

    /// The error a failed wait surfaces to the caller, if any.
    pub fn into_error(self) -> Option<L2capError> {
        match self {
            Readiness::PeerClosed => Some(L2capError::PeerClosed),
            Readiness::LocallyClosed => Some(L2capError::ConnectionClosed),
            Readiness::Error(source) => Some(L2capError::io("Failed to read", source)),
            Readiness::Waiting | Readiness::Ready | Readiness::Cancelled => None,
        }
    }
}

/// Rounds up to whole milliseconds, never below one, so a wait always blocks.
fn timeout_ms(interval: Duration) -> libc::c_int {
    let ms = interval.as_nanos().div_ceil(1_000_000).max(1);
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}

/// Waits up to `interval` for `fd` to become readable, hang up or fail.
///
/// Socket failures take precedence over cancellation, and cancellation takes
/// precedence over available data.
pub fn wait<C: Cancellation + ?Sized>(fd: RawFd, interval: Duration, cancel: &C) -> Readiness {
    if fd < 0 {
        return Readiness::LocallyClosed;
    }

    let mut fds = [
        libc::pollfd {
            fd,
            events: WAIT_EVENTS,
            revents: 0,
        },
        libc::pollfd {
            fd: cancel.wake_fd().unwrap_or(-1),
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    let nfds = if fds[1].fd >= 0 { 2 } else { 1 };

    let rc = unsafe { libc::poll(fds.as_mut_ptr(), nfds, timeout_ms(interval)) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Readiness::Waiting;
        }
        return Readiness::Error(err);
    }

    let state = if rc == 0 {
        Readiness::Waiting
    } else {
        Readiness::from_revents(fds[0].revents)
    };

    if state.is_terminal() {
        return state;
    }
    if cancel.is_cancelled() {
        trace!("poll: wait on handle {} cancelled", fd);
        return Readiness::Cancelled;
    }
    state
}
