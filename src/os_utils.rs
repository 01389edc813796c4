//! Utilities pertaining to os-level process settings
//!

/// Restore the default SIGPIPE disposition
///
/// The Rust runtime ignores SIGPIPE, which would surface a closed
/// downstream pipe as a write error instead of a silent exit.
///
pub fn restore_default_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
