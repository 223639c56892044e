//! Touch gesture recognition.
//!
//! The host delivers raw multi-touch samples; the compositor wants a
//! pointer. This state machine reconstructs click, drag, scroll and
//! right-click semantics from one tracked primary contact:
//!
//! - quick tap → left click
//! - hold without movement → left press, drag until release
//! - two stationary contacts held briefly → right click
//! - two contacts with vertical travel → scroll ticks
//!
//! Finger displacement moves the cursor in the *inverted* direction,
//! trackpad-style, clamped to the normalized [0,1] output square. Given an
//! identical sample timeline the emitted sequence is identical: every
//! threshold fires at most once per gesture and a pressed button is never
//! pressed again before its release.

use crate::core::events::{PointerEvent, TouchAction, TouchSample};
use crate::core::input::{AXIS_DISCRETE_STEP, AXIS_NOTCH, BTN_LEFT, BTN_RIGHT};

/// Gesture timing and distance thresholds.
///
/// The values are empirical carry-overs; adjust here rather than deriving
/// new ones inline.
#[derive(Debug, Clone, Copy)]
pub struct GestureTuning {
    /// A contact lifted earlier than this without moving is a tap.
    pub tap_ms: u64,
    /// A stationary contact held longer than this starts a drag.
    pub hold_ms: u64,
    /// Two stationary contacts held longer than this are a right click.
    pub two_finger_tap_ms: u64,
    /// Vertical two-finger travel per scroll tick, in host pixels.
    pub scroll_px: f64,
    /// Minimum normalized displacement magnitude that counts as movement.
    pub move_epsilon: f64,
}

impl Default for GestureTuning {
    fn default() -> Self {
        Self {
            tap_ms: 200,
            hold_ms: 200,
            two_finger_tap_ms: 150,
            scroll_px: 150.0,
            move_epsilon: 0.0001,
        }
    }
}

/// The tracked primary contact.
#[derive(Debug, Clone, Copy)]
struct TouchContact {
    id: i32,
    /// Last sampled position, normalized.
    x: f64,
    y: f64,
    /// Last inverted displacement (previous - current).
    dx: f64,
    dy: f64,
    down_at: u64,
    moved: bool,
    button_down: bool,
}

#[derive(Debug)]
pub struct GestureRecognizer {
    tuning: GestureTuning,
    /// Output extent in host pixels, for normalizing raw coordinates.
    width: f64,
    height: f64,
    cursor_x: f64,
    cursor_y: f64,
    touch: Option<TouchContact>,
    /// Running vertical travel between scroll ticks. Owned per recognizer
    /// so concurrent gestures on different outputs stay independent.
    scroll_accum: f64,
}

impl GestureRecognizer {
    pub fn new(tuning: GestureTuning, width: u32, height: u32) -> Self {
        Self {
            tuning,
            width: width.max(1) as f64,
            height: height.max(1) as f64,
            cursor_x: 0.5,
            cursor_y: 0.5,
            touch: None,
            scroll_accum: 0.0,
        }
    }

    /// Track a mode change so raw coordinates keep normalizing correctly.
    pub fn set_extent(&mut self, width: u32, height: u32) {
        self.width = width.max(1) as f64;
        self.height = height.max(1) as f64;
    }

    pub fn cursor(&self) -> (f64, f64) {
        (self.cursor_x, self.cursor_y)
    }

    /// Feed one raw touch sample; pointer events are appended to `out`.
    pub fn handle(&mut self, sample: &TouchSample, time_ms: u64, out: &mut Vec<PointerEvent>) {
        match sample.action {
            TouchAction::Down => self.on_down(sample, time_ms),
            TouchAction::Up | TouchAction::PointerUp => self.on_up(sample, time_ms, out),
            TouchAction::Move => self.on_move(sample, time_ms, out),
            TouchAction::PointerDown | TouchAction::Cancel => {}
        }
    }

    /// The host render view changed; park the cursor in the center.
    pub fn surface_changed(&mut self, time_ms: u64, out: &mut Vec<PointerEvent>) {
        self.cursor_x = 0.5;
        self.cursor_y = 0.5;
        self.emit_motion(time_ms, out);
    }

    fn on_down(&mut self, sample: &TouchSample, time_ms: u64) {
        let Some(point) = sample.points.get(sample.changed) else {
            return;
        };
        self.touch = Some(TouchContact {
            id: point.id,
            x: point.x / self.width,
            y: point.y / self.height,
            dx: 0.0,
            dy: 0.0,
            down_at: time_ms,
            moved: false,
            button_down: false,
        });
        self.scroll_accum = 0.0;
    }

    fn on_up(&mut self, sample: &TouchSample, time_ms: u64, out: &mut Vec<PointerEvent>) {
        let Some(contact) = self.touch else {
            return;
        };
        let lifted = sample.points.get(sample.changed).map(|p| p.id);
        if lifted != Some(contact.id) {
            // a secondary finger lifted; the gesture continues
            return;
        }

        let mut button_down = contact.button_down;
        let mut time_ms = time_ms;
        if !contact.moved && time_ms.saturating_sub(contact.down_at) < self.tuning.tap_ms {
            Self::emit_button(BTN_LEFT, true, time_ms, out);
            time_ms += 1;
            button_down = true;
        }
        if button_down {
            Self::emit_button(BTN_LEFT, false, time_ms, out);
        }

        self.touch = None;
        self.scroll_accum = 0.0;
    }

    fn on_move(&mut self, sample: &TouchSample, time_ms: u64, out: &mut Vec<PointerEvent>) {
        let Some(mut contact) = self.touch else {
            return;
        };
        let Some(point) = sample.points.iter().find(|p| p.id == contact.id) else {
            return;
        };

        let nx = point.x / self.width;
        let ny = point.y / self.height;
        let dx = contact.x - nx;
        let dy = contact.y - ny;
        let mut fresh = false;
        if dx.hypot(dy) > self.tuning.move_epsilon {
            contact.dx = dx;
            contact.dy = dy;
            contact.x = nx;
            contact.y = ny;
            contact.moved = true;
            fresh = true;
        }

        let held_ms = time_ms.saturating_sub(contact.down_at);
        let two_contacts = sample.points.len() == 2;

        if contact.moved && two_contacts {
            if fresh {
                self.scroll_accum += contact.dy;
            }
            let threshold = self.tuning.scroll_px / self.height;
            if self.scroll_accum > threshold {
                self.scroll_accum = 0.0;
                Self::emit_axis(1, time_ms, out);
            } else if self.scroll_accum < -threshold {
                self.scroll_accum = 0.0;
                Self::emit_axis(-1, time_ms, out);
            }
        } else if !contact.moved
            && !contact.button_down
            && two_contacts
            && held_ms > self.tuning.two_finger_tap_ms
        {
            Self::emit_button(BTN_RIGHT, true, time_ms, out);
            Self::emit_button(BTN_RIGHT, false, time_ms, out);
            // suppress repeat firing for the rest of this gesture
            contact.moved = true;
        } else if !contact.moved && !contact.button_down && held_ms > self.tuning.hold_ms {
            Self::emit_button(BTN_LEFT, true, time_ms, out);
            contact.button_down = true;
        } else if contact.moved && fresh {
            self.cursor_x = (self.cursor_x + contact.dx).clamp(0.0, 1.0);
            self.cursor_y = (self.cursor_y + contact.dy).clamp(0.0, 1.0);
            self.emit_motion(time_ms, out);
        }

        self.touch = Some(contact);
    }

    fn emit_motion(&self, time_ms: u64, out: &mut Vec<PointerEvent>) {
        out.push(PointerEvent::MotionAbsolute {
            time_ms,
            x: self.cursor_x,
            y: self.cursor_y,
        });
        out.push(PointerEvent::Frame);
    }

    fn emit_button(button: u32, pressed: bool, time_ms: u64, out: &mut Vec<PointerEvent>) {
        out.push(PointerEvent::Button {
            time_ms,
            button,
            pressed,
        });
        out.push(PointerEvent::Frame);
    }

    fn emit_axis(ticks: i32, time_ms: u64, out: &mut Vec<PointerEvent>) {
        out.push(PointerEvent::Axis {
            time_ms,
            delta: f64::from(ticks) * AXIS_NOTCH,
            delta_discrete: ticks * AXIS_DISCRETE_STEP,
        });
        out.push(PointerEvent::Frame);
    }
}
