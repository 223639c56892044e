//! Output objects.
//!
//! One output fronts one host surface: it owns the presentation pipeline,
//! the gesture recognizer and the key translator for that surface, and it
//! routes the host's per-surface lifecycle events. Outputs are created on
//! add and destroyed on remote destroy or backend teardown; destruction
//! stops the presenting thread and drains its queues before anything else
//! goes away.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::core::buffer::PresentBuffer;
use crate::core::errors::{BackendError, Result};
use crate::core::events::{BackendEvent, HostEvent, HostEventKind};
use crate::core::input::{GestureRecognizer, GestureTuning, KeyOutcome, KeyTranslator};
use crate::core::pipeline::PresentationPipeline;
use crate::host::api::{
    try_host, HostConnection, HostSurfaceId, InsetBehaviour, InsetKind, Orientation,
    SurfaceViewConfig,
};
use crate::util::time::current_time_ms;

pub const OUTPUT_STATE_MODE: u32 = 1 << 0;
pub const OUTPUT_STATE_BUFFER: u32 = 1 << 1;
pub const OUTPUT_STATE_BACKEND_OPTIONAL: u32 = 1 << 2;

const SUPPORTED_OUTPUT_STATE: u32 =
    OUTPUT_STATE_BACKEND_OPTIONAL | OUTPUT_STATE_BUFFER | OUTPUT_STATE_MODE;

/// Default refresh in mHz (60 Hz).
pub const DEFAULT_REFRESH: i32 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    /// mHz, 0 = unspecified
    pub refresh: i32,
}

/// Pending state for `test`/`commit`, a bitmask plus the fields it covers.
#[derive(Debug, Clone, Default)]
pub struct OutputState {
    pub committed: u32,
    pub mode: Option<Mode>,
    pub buffer: Option<PresentBuffer>,
}

impl OutputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = Some(mode);
        self.committed |= OUTPUT_STATE_MODE;
    }

    pub fn set_buffer(&mut self, buffer: PresentBuffer) {
        self.buffer = Some(buffer);
        self.committed |= OUTPUT_STATE_BUFFER;
    }
}

/// What the backend should do with an output after one routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Continue,
    /// The host destroyed the surface: normal removal, not an error.
    RemoveOutput,
}

pub struct Output {
    id: OutputId,
    name: String,
    description: String,
    conn: Arc<dyn HostConnection>,
    host_surface: HostSurfaceId,
    mode: Mode,
    pipeline: PresentationPipeline,
    gestures: GestureRecognizer,
    keys: KeyTranslator,
    commit_seq: u32,
}

impl Output {
    pub(crate) fn new(
        conn: Arc<dyn HostConnection>,
        id: OutputId,
        number: u32,
        tuning: GestureTuning,
        frame_interval: Duration,
    ) -> anyhow::Result<Self> {
        let host_surface = conn
            .create_surface()
            .context("failed to create host surface")?;
        let config = conn
            .configuration(host_surface)
            .context("failed to query host configuration")?;

        // landscape use of a portrait screen: the reported axes swap
        let mode = Mode {
            width: (f64::from(config.screen_height) * config.density) as u32,
            height: (f64::from(config.screen_width) * config.density) as u32,
            refresh: DEFAULT_REFRESH,
        };

        let pipeline = PresentationPipeline::spawn(conn.clone(), host_surface, frame_interval)
            .context("failed to spawn presenting thread")?;
        let gestures = GestureRecognizer::new(tuning, mode.width, mode.height);

        Ok(Self {
            id,
            name: format!("HOST-{}", number),
            description: format!("Remote host output {}", number),
            conn,
            host_surface,
            mode,
            pipeline,
            gestures,
            keys: KeyTranslator::new(),
            commit_seq: 0,
        })
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn host_surface(&self) -> HostSurfaceId {
        self.host_surface
    }

    pub fn is_foreground(&self) -> bool {
        self.pipeline.is_foreground()
    }

    /// Completion readiness fd for the compositor's poll loop.
    pub fn completion_fd(&self) -> std::os::unix::io::RawFd {
        self.pipeline.completion_fd()
    }

    /// Validate a pending state. Any bit outside the supported mask is
    /// rejected here, never silently dropped at commit time.
    pub fn test(&self, state: &OutputState) -> Result<()> {
        let unsupported = state.committed & !SUPPORTED_OUTPUT_STATE;
        if unsupported != 0 {
            tracing::debug!("unsupported output state bits: {:#x}", unsupported);
            return Err(BackendError::UnsupportedState(unsupported));
        }
        if state.committed & OUTPUT_STATE_MODE != 0 && state.mode.is_none() {
            return Err(BackendError::state_error("mode commit without a mode"));
        }
        Ok(())
    }

    /// Apply a pending state: mode changes take effect immediately,
    /// buffers enter the presentation pipeline.
    pub fn commit(&mut self, state: &OutputState) -> Result<()> {
        self.test(state)?;

        if state.committed & OUTPUT_STATE_MODE != 0 {
            if let Some(mode) = state.mode {
                self.set_custom_mode(mode);
            }
        }
        if state.committed & OUTPUT_STATE_BUFFER != 0 {
            if let Some(buffer) = &state.buffer {
                self.pipeline.commit(buffer)?;
            }
        }
        Ok(())
    }

    fn set_custom_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.gestures.set_extent(mode.width, mode.height);
    }

    /// Route one host event addressed to this output. Loop thread only.
    pub(crate) fn handle_activity_event(
        &mut self,
        event: &HostEvent,
        events: &mut Vec<BackendEvent>,
    ) -> Disposition {
        let time_ms = current_time_ms();
        match &event.kind {
            HostEventKind::Created => self.configure_surface_view(),
            HostEventKind::Started | HostEventKind::Resumed => {
                self.pipeline.set_foreground(true);
            }
            HostEventKind::Paused => self.pipeline.set_foreground(false),
            HostEventKind::Destroyed => return Disposition::RemoveOutput,
            HostEventKind::Key { code, down } => {
                self.handle_key(*code, *down, time_ms, events);
            }
            HostEventKind::Touch(sample) => {
                let mut pointer = Vec::new();
                self.gestures.handle(sample, time_ms, &mut pointer);
                for event in pointer {
                    events.push(BackendEvent::Pointer {
                        output: self.id,
                        event,
                    });
                }
            }
            HostEventKind::SurfaceChanged { .. } => {
                let mut pointer = Vec::new();
                self.gestures.surface_changed(time_ms, &mut pointer);
                for event in pointer {
                    events.push(BackendEvent::Pointer {
                        output: self.id,
                        event,
                    });
                }
            }
            HostEventKind::FrameComplete => {}
        }
        Disposition::Continue
    }

    fn handle_key(
        &mut self,
        code: u32,
        down: bool,
        time_ms: u64,
        events: &mut Vec<BackendEvent>,
    ) {
        let mut keys = Vec::new();
        match self.keys.translate(code, down, time_ms, &mut keys) {
            KeyOutcome::Emitted => {
                for event in keys {
                    events.push(BackendEvent::Keyboard {
                        output: self.id,
                        event,
                    });
                }
            }
            KeyOutcome::Refocus => {
                if let Some(view) = self.pipeline.view() {
                    try_host!(self.conn.set_focus(self.host_surface, view, true));
                }
            }
            KeyOutcome::Latched | KeyOutcome::Unmapped => {}
        }
    }

    /// The host surface finished coming up; bring up its render view.
    fn configure_surface_view(&mut self) {
        try_host!(self
            .conn
            .set_orientation(self.host_surface, Orientation::Landscape));
        try_host!(self.conn.configure_insets(
            self.host_surface,
            InsetKind::NavigationBar,
            InsetBehaviour::Transient,
        ));
        match self.conn.create_surface_view(self.host_surface) {
            Ok(view) => {
                try_host!(self.conn.configure_surface_view(
                    self.host_surface,
                    view,
                    SurfaceViewConfig::default(),
                ));
                try_host!(self.conn.set_touch_delivery(self.host_surface, view, true));
                try_host!(self.conn.set_focus(self.host_surface, view, false));
                self.pipeline.set_view(view);
            }
            Err(err) => {
                tracing::error!(
                    "failed to create surface view on {:?}: {}",
                    self.host_surface,
                    err
                );
            }
        }
    }

    /// Recycle completed buffers and report at most one presented/frame
    /// pair for the pass. Loop thread only.
    pub fn process_completions(&mut self, events: &mut Vec<BackendEvent>) {
        let recycled = self.pipeline.recycle();
        if recycled == 0 {
            return;
        }
        self.commit_seq = self.commit_seq.wrapping_add(1);
        events.push(BackendEvent::OutputPresented {
            output: self.id,
            commit_seq: self.commit_seq,
            zero_copy: true,
        });
        events.push(BackendEvent::OutputFrame { output: self.id });
    }

    /// Release the host surface and stop the presenting thread.
    pub(crate) fn destroy(&mut self) {
        try_host!(self.conn.destroy_surface(self.host_surface));
        self.pipeline.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{TouchAction, TouchPoint, TouchSample};
    use crate::host::api::StubHostConnection;

    fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    fn output(stub: &Arc<StubHostConnection>) -> Output {
        Output::new(
            stub.clone(),
            OutputId(1),
            1,
            GestureTuning::default(),
            Duration::from_millis(1),
        )
        .unwrap()
    }

    fn activity(kind: HostEventKind) -> HostEvent {
        HostEvent {
            surface: HostSurfaceId(1),
            kind,
        }
    }

    #[test]
    fn test_unsupported_state_rejected_at_test_time() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);

        let state = OutputState {
            committed: OUTPUT_STATE_BUFFER | (1 << 5),
            ..Default::default()
        };
        assert!(matches!(
            out.test(&state),
            Err(BackendError::UnsupportedState(bits)) if bits == 1 << 5
        ));
        assert!(out.commit(&state).is_err());
    }

    #[test]
    fn test_mode_commit_applies_immediately() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);

        let mode = Mode {
            width: 800,
            height: 600,
            refresh: DEFAULT_REFRESH,
        };
        let mut state = OutputState::new();
        state.set_mode(mode);

        out.commit(&state).unwrap();
        assert_eq!(out.mode(), mode);
    }

    #[test]
    fn test_lifecycle_events_drive_foreground() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);
        let mut events = Vec::new();

        assert!(!out.is_foreground());
        out.handle_activity_event(&activity(HostEventKind::Resumed), &mut events);
        assert!(out.is_foreground());
        out.handle_activity_event(&activity(HostEventKind::Paused), &mut events);
        assert!(!out.is_foreground());
        assert!(events.is_empty());
    }

    #[test]
    fn test_remote_destroy_requests_removal() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);
        let mut events = Vec::new();

        let disposition =
            out.handle_activity_event(&activity(HostEventKind::Destroyed), &mut events);
        assert_eq!(disposition, Disposition::RemoveOutput);
    }

    #[test]
    fn test_back_key_refocuses_surface_view() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);
        let mut events = Vec::new();

        // Created brings up the view (and issues the initial focus call)
        out.handle_activity_event(&activity(HostEventKind::Created), &mut events);
        let baseline = stub.focus_request_count();

        out.handle_activity_event(
            &activity(HostEventKind::Key { code: 4, down: true }),
            &mut events,
        );
        assert_eq!(stub.focus_request_count(), baseline + 1);
        assert!(events.is_empty(), "back key must not reach the compositor");
    }

    #[test]
    fn test_touch_events_surface_as_pointer_events() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);
        let mut events = Vec::new();

        let down = TouchSample {
            action: TouchAction::Down,
            points: vec![TouchPoint {
                id: 1,
                x: 100.0,
                y: 100.0,
            }],
            changed: 0,
        };
        let up = TouchSample {
            action: TouchAction::Up,
            points: vec![TouchPoint {
                id: 1,
                x: 100.0,
                y: 100.0,
            }],
            changed: 0,
        };
        out.handle_activity_event(&activity(HostEventKind::Touch(down)), &mut events);
        out.handle_activity_event(&activity(HostEventKind::Touch(up)), &mut events);

        // a quick tap: button press, frame, release, frame
        assert_eq!(events.len(), 4);
        assert!(events
            .iter()
            .all(|e| matches!(e, BackendEvent::Pointer { .. })));
    }

    #[test]
    fn test_completion_pass_reports_one_pair() {
        let stub = StubHostConnection::new();
        let mut out = output(&stub);

        let buffer = PresentBuffer::new(1, 64, 64);
        let mut state = OutputState::new();
        state.set_buffer(buffer.clone());
        out.commit(&state).unwrap();

        let mut events = Vec::new();
        wait_for(|| {
            out.process_completions(&mut events);
            !events.is_empty()
        });
        assert_eq!(
            events,
            vec![
                BackendEvent::OutputPresented {
                    output: OutputId(1),
                    commit_seq: 1,
                    zero_copy: true,
                },
                BackendEvent::OutputFrame {
                    output: OutputId(1),
                },
            ]
        );
        assert_eq!(buffer.lock_count(), 0);

        // an empty pass reports nothing
        let before = events.len();
        out.process_completions(&mut events);
        assert_eq!(events.len(), before);
    }
}
