//! Loop-thread input translation.
//!
//! Touch samples and host key codes arrive from the event bridge already
//! routed to one output; the types here turn them into pointer and
//! keyboard events for the compositor. All state is per output and only
//! ever touched from the loop thread.

pub mod gesture;
pub mod keymap;

pub use gesture::{GestureRecognizer, GestureTuning};
pub use keymap::{KeyOutcome, KeyTranslator};

/// Standard pointer button codes (input-event-codes).
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;

/// Pointer units travelled per scroll notch.
pub const AXIS_NOTCH: f64 = 15.0;

/// Discrete axis step reported per scroll notch.
pub const AXIS_DISCRETE_STEP: i32 = 120;
