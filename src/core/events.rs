//! Event types crossing the backend's two boundaries.
//!
//! `HostEvent` is what the receiver thread reads from the host connection;
//! `BackendEvent` is what the loop thread raises toward the compositor.
//! Only the loop thread ever produces `BackendEvent`s — receiver and
//! presenting threads stay on their side of the queues.

use crate::core::output::OutputId;
use crate::host::api::HostSurfaceId;

// ============================================================================
// Host Events (consumed)
// ============================================================================

/// One event received from the host, addressed to one host surface.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub surface: HostSurfaceId,
    pub kind: HostEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEventKind {
    /// The host surface finished coming up; its render view can be created.
    Created,
    /// The surface became the one the user sees.
    Started,
    Resumed,
    /// The surface left the foreground.
    Paused,
    /// The host destroyed the surface. Normal removal, not an error.
    Destroyed,
    Key { code: u32, down: bool },
    Touch(TouchSample),
    /// The render view changed size; the cursor is recentered.
    SurfaceChanged { width: u32, height: u32 },
    FrameComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// First contact went down.
    Down,
    /// Last contact lifted.
    Up,
    /// An additional contact went down.
    PointerDown,
    /// A non-final contact lifted.
    PointerUp,
    Move,
    Cancel,
}

/// Raw touch coordinates are in host surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchSample {
    pub action: TouchAction,
    /// All current contacts, one entry per finger.
    pub points: Vec<TouchPoint>,
    /// Index into `points` of the contact that triggered this sample.
    pub changed: usize,
}

// ============================================================================
// Compositor Events (exposed)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDeviceKind {
    Keyboard,
    Pointer,
}

/// Pointer device events. Every motion/button/axis is followed by a
/// `Frame` marking the end of one logical hardware event group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Cursor position in normalized [0,1] output coordinates.
    MotionAbsolute { time_ms: u64, x: f64, y: f64 },
    Button { time_ms: u64, button: u32, pressed: bool },
    /// Vertical wheel-style scroll.
    Axis {
        time_ms: u64,
        delta: f64,
        delta_discrete: i32,
    },
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    Key {
        time_ms: u64,
        keycode: u32,
        pressed: bool,
    },
}

/// Events the backend raises toward the compositor. Drained with
/// `Backend::take_events` on the loop thread.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    NewOutput { output: OutputId },
    NewInput {
        output: OutputId,
        device: InputDeviceKind,
    },
    OutputRemoved { output: OutputId },
    Pointer {
        output: OutputId,
        event: PointerEvent,
    },
    Keyboard {
        output: OutputId,
        event: KeyboardEvent,
    },
    /// One batch of committed buffers finished its trip through the
    /// presentation pipeline.
    OutputPresented {
        output: OutputId,
        commit_seq: u32,
        zero_copy: bool,
    },
    /// The output is ready for the next rendered frame.
    OutputFrame { output: OutputId },
    /// The host connection is gone; the compositor should destroy the
    /// backend.
    ConnectionLost,
}
