//! Microphone permission gate.
//!
//! The platform decides whether the app may record. The recorder only asks,
//! synchronously, right before opening the device; requesting the
//! permission from the user is the host application's job.

/// Answers whether microphone access is currently granted.
///
/// Implemented for `bool` (a fixed answer) and for closures, so a host can
/// pass a function that queries its platform permission API.
///
/// # Example
///
/// ```
/// use panic_buffer::PermissionGate;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let granted = Arc::new(AtomicBool::new(false));
/// let flag = granted.clone();
/// let gate = move || flag.load(Ordering::SeqCst);
///
/// assert!(!gate.microphone_granted());
/// granted.store(true, Ordering::SeqCst);
/// assert!(gate.microphone_granted());
/// ```
pub trait PermissionGate: Send + Sync {
    /// Returns `true` if the microphone may be opened.
    fn microphone_granted(&self) -> bool;
}

impl PermissionGate for bool {
    fn microphone_granted(&self) -> bool {
        *self
    }
}

impl<F> PermissionGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn microphone_granted(&self) -> bool {
        self()
    }
}
