//! Host key-code translation.
//!
//! Fixed table from host key codes to standard input-event codes, plus one
//! stateful wrinkle: the host keyboard reports shift as a standalone latch
//! key that applies to exactly the next translated key. The latched key's
//! press/release cycle is bracketed by a synthetic shift press before it
//! and a synthetic shift release after it.

use crate::core::events::KeyboardEvent;

/// Host "back" navigation key. Never translated; it re-asserts input focus
/// on the host surface view instead.
pub const HOST_KEY_BACK: u32 = 4;

/// Host code of the shift latch.
const HOST_KEY_SHIFT: u32 = 59;

/// Standard codes named by the translation logic.
pub const KEY_BACKSPACE: u32 = 14;
pub const KEY_ENTER: u32 = 28;
pub const KEY_A: u32 = 30;
pub const KEY_LEFTSHIFT: u32 = 42;
pub const KEY_SPACE: u32 = 57;

/// (host code, standard code) pairs for the mapped subset: digits,
/// letters, enter, space, backspace, shift, comma, period.
const KEYMAP: &[(u32, u32)] = &[
    (7, 11),  // 0
    (8, 2),   // 1
    (9, 3),   // 2
    (10, 4),  // 3
    (11, 5),  // 4
    (12, 6),  // 5
    (13, 7),  // 6
    (14, 8),  // 7
    (15, 9),  // 8
    (16, 10), // 9
    (29, 30), // a
    (30, 48), // b
    (31, 46), // c
    (32, 32), // d
    (33, 18), // e
    (34, 33), // f
    (35, 34), // g
    (36, 35), // h
    (37, 23), // i
    (38, 36), // j
    (39, 37), // k
    (40, 38), // l
    (41, 50), // m
    (42, 49), // n
    (43, 24), // o
    (44, 25), // p
    (45, 16), // q
    (46, 19), // r
    (47, 31), // s
    (48, 20), // t
    (49, 22), // u
    (50, 47), // v
    (51, 17), // w
    (52, 45), // x
    (53, 21), // y
    (54, 44), // z
    (55, 51), // comma
    (56, 52), // period
    (HOST_KEY_SHIFT, KEY_LEFTSHIFT),
    (62, KEY_SPACE),
    (66, KEY_ENTER),
    (67, KEY_BACKSPACE),
];

fn lookup(code: u32) -> Option<u32> {
    KEYMAP
        .iter()
        .find(|&&(host, _)| host == code)
        .map(|&(_, standard)| standard)
}

/// What a host key event turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Key events were appended for the compositor.
    Emitted,
    /// Host "back" key: the caller should refocus the surface view.
    Refocus,
    /// The shift latch armed; nothing was emitted.
    Latched,
    /// Unmapped code, reported and dropped.
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftLatch {
    Clear,
    /// Latch armed; the next key gets the shift bracket.
    Armed,
    /// Bracket open; closes when this key releases.
    Held { keycode: u32 },
}

/// Per-output key translator.
#[derive(Debug)]
pub struct KeyTranslator {
    latch: ShiftLatch,
}

impl KeyTranslator {
    pub fn new() -> Self {
        Self {
            latch: ShiftLatch::Clear,
        }
    }

    pub fn shift_latched(&self) -> bool {
        self.latch != ShiftLatch::Clear
    }

    /// Translate one host key event, appending emitted key events to `out`.
    pub fn translate(
        &mut self,
        code: u32,
        down: bool,
        time_ms: u64,
        out: &mut Vec<KeyboardEvent>,
    ) -> KeyOutcome {
        if code == HOST_KEY_BACK {
            return KeyOutcome::Refocus;
        }
        let Some(keycode) = lookup(code) else {
            tracing::error!("unhandled host keycode {}", code);
            return KeyOutcome::Unmapped;
        };
        if keycode == KEY_LEFTSHIFT {
            self.latch = ShiftLatch::Armed;
            return KeyOutcome::Latched;
        }

        match self.latch {
            ShiftLatch::Clear => {
                out.push(KeyboardEvent::Key {
                    time_ms,
                    keycode,
                    pressed: down,
                });
            }
            ShiftLatch::Armed => {
                out.push(KeyboardEvent::Key {
                    time_ms,
                    keycode: KEY_LEFTSHIFT,
                    pressed: true,
                });
                out.push(KeyboardEvent::Key {
                    time_ms,
                    keycode,
                    pressed: down,
                });
                if down {
                    self.latch = ShiftLatch::Held { keycode };
                } else {
                    // a lone release still consumes the latch
                    out.push(KeyboardEvent::Key {
                        time_ms,
                        keycode: KEY_LEFTSHIFT,
                        pressed: false,
                    });
                    self.latch = ShiftLatch::Clear;
                }
            }
            ShiftLatch::Held { keycode: held } => {
                out.push(KeyboardEvent::Key {
                    time_ms,
                    keycode,
                    pressed: down,
                });
                if keycode == held && !down {
                    out.push(KeyboardEvent::Key {
                        time_ms,
                        keycode: KEY_LEFTSHIFT,
                        pressed: false,
                    });
                    self.latch = ShiftLatch::Clear;
                }
            }
        }
        KeyOutcome::Emitted
    }
}

impl Default for KeyTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_A: u32 = 29;
    const HOST_B: u32 = 30;

    fn key(keycode: u32, pressed: bool, time_ms: u64) -> KeyboardEvent {
        KeyboardEvent::Key {
            time_ms,
            keycode,
            pressed,
        }
    }

    #[test]
    fn test_plain_key_passes_through() {
        let mut translator = KeyTranslator::new();
        let mut out = Vec::new();

        assert_eq!(translator.translate(HOST_A, true, 10, &mut out), KeyOutcome::Emitted);
        assert_eq!(translator.translate(HOST_A, false, 20, &mut out), KeyOutcome::Emitted);
        assert_eq!(out, vec![key(KEY_A, true, 10), key(KEY_A, false, 20)]);
    }

    #[test]
    fn test_shift_latch_brackets_next_key_cycle() {
        let mut translator = KeyTranslator::new();
        let mut out = Vec::new();

        assert_eq!(
            translator.translate(HOST_KEY_SHIFT, true, 0, &mut out),
            KeyOutcome::Latched
        );
        assert!(out.is_empty());
        assert!(translator.shift_latched());

        translator.translate(HOST_A, true, 10, &mut out);
        translator.translate(HOST_A, false, 20, &mut out);

        assert_eq!(
            out,
            vec![
                key(KEY_LEFTSHIFT, true, 10),
                key(KEY_A, true, 10),
                key(KEY_A, false, 20),
                key(KEY_LEFTSHIFT, false, 20),
            ]
        );
        assert!(!translator.shift_latched());

        // the latch is consumed; the next key is unshifted
        out.clear();
        translator.translate(HOST_B, true, 30, &mut out);
        assert_eq!(out, vec![key(48, true, 30)]);
    }

    #[test]
    fn test_latch_consumed_by_lone_release() {
        let mut translator = KeyTranslator::new();
        let mut out = Vec::new();

        translator.translate(HOST_KEY_SHIFT, true, 0, &mut out);
        translator.translate(HOST_A, false, 10, &mut out);

        assert_eq!(
            out,
            vec![
                key(KEY_LEFTSHIFT, true, 10),
                key(KEY_A, false, 10),
                key(KEY_LEFTSHIFT, false, 10),
            ]
        );
        assert!(!translator.shift_latched());
    }

    #[test]
    fn test_unmapped_code_is_dropped_and_pipeline_continues() {
        let mut translator = KeyTranslator::new();
        let mut out = Vec::new();

        assert_eq!(
            translator.translate(9999, true, 0, &mut out),
            KeyOutcome::Unmapped
        );
        assert!(out.is_empty());

        assert_eq!(translator.translate(HOST_A, true, 10, &mut out), KeyOutcome::Emitted);
        assert_eq!(out, vec![key(KEY_A, true, 10)]);
    }

    #[test]
    fn test_back_key_requests_refocus() {
        let mut translator = KeyTranslator::new();
        let mut out = Vec::new();

        assert_eq!(
            translator.translate(HOST_KEY_BACK, true, 0, &mut out),
            KeyOutcome::Refocus
        );
        assert!(out.is_empty());
    }
}
