//! Cross-thread render control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ControlFlags {
    exit: AtomicBool,
    reset: AtomicBool,
}

/// Shared handle for stopping the renderer or requesting an image reset
/// from another thread (UI, signal handler).
///
/// Cloning yields another handle to the same flags.
#[derive(Clone, Debug, Default)]
pub struct RenderControl {
    flags: Arc<ControlFlags>,
}

impl RenderControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop rendering. The frame in flight is discarded once every worker
    /// has finished its current tile, and later frames are refused until
    /// [`RenderControl::resume`].
    pub fn exit(&self) {
        self.flags.exit.store(true, Ordering::Release);
    }

    /// Allow rendering again after [`RenderControl::exit`].
    pub fn resume(&self) {
        self.flags.exit.store(false, Ordering::Release);
    }

    pub fn is_exit_requested(&self) -> bool {
        self.flags.exit.load(Ordering::Acquire)
    }

    /// Ask for the accumulated image to be cleared before the next frame.
    pub fn request_reset(&self) {
        self.flags.reset.store(true, Ordering::Release);
    }

    /// Consume a pending reset request.
    pub(crate) fn take_reset(&self) -> bool {
        self.flags.reset.swap(false, Ordering::AcqRel)
    }
}
