//! Cooperative cancellation driven by the interrupt signal.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{BackupError, BackupResult, EXIT_INTERRUPTED};

/// Shared flag tripped by Ctrl-C and polled by long-running operations.
///
/// Installing the handler replaces the default "terminate immediately"
/// behaviour, so every stage that can take a while must call
/// [`CancelToken::check`] between units of work.  The returned
/// [`BackupError::UserCancelled`] unwinds through the normal `?` path, which
/// lets drop guards remove partial session directories and staging areas.
///
/// A second interrupt exits at once with the interrupted status, which is
/// how a prompt blocked on terminal input is abandoned.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled and not wired to any signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token and register it as the process Ctrl-C handler.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler has already been installed.
    pub fn install() -> BackupResult<Self> {
        let token = Self::new();
        let flag = token.clone();
        ctrlc::set_handler(move || {
            if flag.signal() {
                std::process::exit(i32::from(EXIT_INTERRUPTED));
            }
        })
        .map_err(|e| {
            BackupError::Configuration(format!("cannot install interrupt handler: {e}"))
        })?;
        Ok(token)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Request cancellation, returning whether it had already been
    /// requested.
    #[must_use]
    pub fn signal(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return [`BackupError::UserCancelled`] once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::UserCancelled`] if the token has been tripped.
    pub fn check(&self) -> BackupResult<()> {
        if self.is_cancelled() {
            return Err(BackupError::UserCancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(BackupError::UserCancelled)));
    }

    #[test]
    fn signal_reports_repeat_interrupts() {
        let token = CancelToken::new();
        assert!(!token.signal());
        assert!(token.is_cancelled());
        assert!(token.signal());
    }
}
