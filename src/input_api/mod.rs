//! Delivery of OS-level key and pointer notifications. Listeners push
//! structured events into a bounded queue that the tracker consumes; key
//! content is never captured, only a coarse classification of each press.

#[cfg(feature = "win")]
pub mod win;

use anyhow::Result;
use tokio::sync::mpsc;

/// Capacity of the event queue between the OS listener and the tracker. Events past this are
/// dropped rather than blocking the delivery thread.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Classification of a key press. Terminator keys (space, enter, tab) mark word boundaries; this
/// is a coarse proxy, not semantic word counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Backspace,
    WordBoundary,
    Other,
}

/// A discrete input notification delivered by an OS listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(KeyPress),
    /// Absolute pointer position in pixels.
    PointerMove { x: f64, y: f64 },
}

/// Contract for platform event sources. Starting may fail when the OS denies the hook; the
/// tracker keeps polling in that case and input metrics stay at zero.
pub trait InputListener: Send {
    fn start(&mut self, events: mpsc::Sender<InputEvent>) -> Result<()>;

    fn stop(&mut self);
}

/// A listener that never emits events. Used on platforms without a capture backend so the rest of
/// the pipeline runs unchanged.
pub struct NoopInputListener;

impl InputListener for NoopInputListener {
    fn start(&mut self, _events: mpsc::Sender<InputEvent>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Serves as a cross-compatible InputListener implementation.
pub struct GenericInputListener {
    inner: Box<dyn InputListener>,
}

impl GenericInputListener {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Self {
                    inner: Box::new(win::WindowsInputListener::new()),
                }
            }
            else {
                Self {
                    inner: Box::new(NoopInputListener),
                }
            }
        }
    }
}

impl Default for GenericInputListener {
    fn default() -> Self {
        Self::new()
    }
}

impl InputListener for GenericInputListener {
    fn start(&mut self, events: mpsc::Sender<InputEvent>) -> Result<()> {
        self.inner.start(events)
    }

    fn stop(&mut self) {
        self.inner.stop()
    }
}
