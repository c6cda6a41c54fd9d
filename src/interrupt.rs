//! SIGINT handling while a deploy runs.
//!
//! The handler only raises a flag so hoist itself keeps running. Child
//! processes in the foreground process group still receive the signal, so a
//! running `git push` dies and only its own environment stops. Environments
//! past their push carry on to completion.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Restores the previous SIGINT disposition when dropped.
pub struct InterruptGuard {
    #[cfg(unix)]
    previous: libc::sighandler_t,
}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the handler for the lifetime of the returned guard.
#[cfg(unix)]
pub fn install() -> InterruptGuard {
    INTERRUPTED.store(false, Ordering::SeqCst);
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    InterruptGuard { previous }
}

#[cfg(not(unix))]
pub fn install() -> InterruptGuard {
    INTERRUPTED.store(false, Ordering::SeqCst);
    InterruptGuard {}
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        // SAFETY: restores the disposition returned by the matching `signal` call.
        unsafe {
            libc::signal(libc::SIGINT, self.previous);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_sigint_raises_flag() {
        let guard = install();
        assert!(!interrupted());

        // SAFETY: delivers SIGINT to this process, which the handler catches.
        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(interrupted());

        drop(guard);
        INTERRUPTED.store(false, Ordering::SeqCst);
    }
}
