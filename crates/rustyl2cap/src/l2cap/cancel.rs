//! Cooperative cancellation for blocking receives
//!
//! A receive consults its [`Cancellation`] between readiness waits. Values
//! that expose a wake descriptor are also polled alongside the socket, so
//! cancelling them interrupts a wait in progress instead of waiting for the
//! next interval boundary.

use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::error::{L2capError, L2capResult};

/// Source of cancellation requests observed by [`L2capChannel::receive`](super::L2capChannel::receive).
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;

    /// Descriptor that becomes readable once cancellation is requested.
    fn wake_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Never cancels; the receive waits until data, peer closure or error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: Cancellation + ?Sized> Cancellation for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn wake_fd(&self) -> Option<RawFd> {
        (**self).wake_fd()
    }
}

impl<T: Cancellation + ?Sized> Cancellation for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn wake_fd(&self) -> Option<RawFd> {
        (**self).wake_fd()
    }
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    event: OwnedFd,
}

/// Shareable cancellation token backed by an `eventfd`.
///
/// Clones share state: cancelling any clone cancels them all. Cancellation
/// is permanent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> L2capResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(L2capError::last_os_error("Failed to create cancellation event"));
        }

        Ok(Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                event: unsafe { OwnedFd::from_raw_fd(fd) },
            }),
        })
    }

    /// Requests cancellation and wakes any receive waiting on this token.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let one: u64 = 1;
        let written = unsafe {
            libc::write(
                self.inner.event.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if written < 0 {
            // The flag is already set, so waiters still see it at the next interval.
            warn!(
                "Failed to signal cancellation event: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

impl Cancellation for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn wake_fd(&self) -> Option<RawFd> {
        Some(self.inner.event.as_raw_fd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancelToken::new().unwrap();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());

        // Cancelling twice is harmless
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wake_fd_readable_after_cancel() {
        let token = CancelToken::new().unwrap();
        let fd = token.wake_fd().unwrap();

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        assert_eq!(unsafe { libc::poll(&mut pfd, 1, 0) }, 0);

        token.cancel();
        assert_eq!(unsafe { libc::poll(&mut pfd, 1, 0) }, 1);
        assert!(pfd.revents & libc::POLLIN != 0);
    }

    #[test]
    fn test_plain_flags() {
        let flag = AtomicBool::new(false);
        assert!(!(&flag).is_cancelled());
        assert!((&flag).wake_fd().is_none());
        flag.store(true, Ordering::SeqCst);
        assert!(flag.is_cancelled());

        assert!(!NeverCancel.is_cancelled());
    }
}
