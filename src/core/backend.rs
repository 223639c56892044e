//! Backend object and loop-thread dispatch.
//!
//! The backend owns the host connection, the event bridge and the output
//! registry. Everything here runs on the compositor's loop thread: events
//! toward the compositor are only ever raised from these methods, while
//! the receiver and presenting threads stay behind their queues. The
//! compositor integrates by polling `event_fd()` and the per-output
//! completion fds, then calling the dispatch/completion drains.

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::bridge::{BridgeItem, EventBridge};
use crate::core::errors::BackendError;
use crate::core::events::{BackendEvent, HostEvent, InputDeviceKind};
use crate::core::input::GestureTuning;
use crate::core::output::{Disposition, Output, OutputId};
use crate::host::api::HostConnection;

/// Buffer capability flags reported to the compositor.
pub const BUFFER_CAP_DATA_PTR: u32 = 1 << 0;
pub const BUFFER_CAP_DMABUF: u32 = 1 << 1;

/// Configuration for the backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Nominal frame interval, used to pace background presenting threads.
    pub frame_interval: Duration,
    /// Gesture thresholds applied to every output's recognizer.
    pub gestures: GestureTuning,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_nanos(16_666_667), // 60Hz
            gestures: GestureTuning::default(),
        }
    }
}

/// The backend object exposed to the compositor.
pub struct Backend {
    conn: Arc<dyn HostConnection>,
    config: BackendConfig,
    bridge: EventBridge,
    outputs: HashMap<OutputId, Output>,
    /// Events for the compositor, drained with `take_events`
    events: Vec<BackendEvent>,
    started: bool,
    destroyed: bool,
    next_output: u32,
}

impl Backend {
    /// Create a backend over an established host connection. Spawns the
    /// receiver thread immediately.
    pub fn new(conn: Arc<dyn HostConnection>, config: BackendConfig) -> Result<Self> {
        tracing::info!("creating remote-host backend");

        let bridge = EventBridge::spawn(conn.clone()).context("failed to start host receiver")?;

        Ok(Self {
            conn,
            config,
            bridge,
            outputs: HashMap::new(),
            events: Vec::new(),
            started: false,
            destroyed: false,
            next_output: 0,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Buffer capabilities: plain memory and dmabuf-backed buffers.
    pub fn buffer_caps(&self) -> u32 {
        BUFFER_CAP_DATA_PTR | BUFFER_CAP_DMABUF
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the backend: announce every pre-existing output and its input
    /// devices to the compositor.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(BackendError::state_error("backend already started").into());
        }
        tracing::info!("starting remote-host backend");

        for id in self.output_ids() {
            self.announce_output(id);
        }
        self.started = true;
        Ok(())
    }

    /// Stop the backend: tear down every output. The host connection stays
    /// up; `destroy` finishes the job.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Err(BackendError::state_error("backend not started").into());
        }
        tracing::info!("stopping remote-host backend");

        for id in self.output_ids() {
            self.remove_output(id);
        }
        self.started = false;
        Ok(())
    }

    /// Full teardown. Outputs first (each joins its presenting thread),
    /// then the connection is closed so the blocking receive returns, and
    /// only then is the receiver thread joined — the queues and wake fds
    /// must outlive their producer.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        tracing::info!("destroying remote-host backend");

        for id in self.output_ids() {
            self.remove_output(id);
        }
        self.conn.close();
        self.bridge.join();

        self.started = false;
        self.destroyed = true;
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Create a new output backed by a fresh host surface.
    pub fn add_output(&mut self) -> Result<OutputId> {
        self.next_output += 1;
        let id = OutputId(self.next_output);

        let output = Output::new(
            self.conn.clone(),
            id,
            self.next_output,
            self.config.gestures,
            self.config.frame_interval,
        )?;
        tracing::info!(
            "added output {} ({}x{})",
            output.name(),
            output.mode().width,
            output.mode().height
        );
        self.outputs.insert(id, output);

        if self.started {
            self.announce_output(id);
        }
        Ok(id)
    }

    /// Destroy one output and tell the compositor it is gone.
    pub fn remove_output(&mut self, id: OutputId) {
        if let Some(mut output) = self.outputs.remove(&id) {
            tracing::info!("removing output {}", output.name());
            output.destroy();
            self.events.push(BackendEvent::OutputRemoved { output: id });
        }
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn output_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.get_mut(&id)
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_ids(&self) -> Vec<OutputId> {
        let mut ids: Vec<OutputId> = self.outputs.keys().copied().collect();
        ids.sort();
        ids
    }

    fn announce_output(&mut self, output: OutputId) {
        self.events.push(BackendEvent::NewOutput { output });
        self.events.push(BackendEvent::NewInput {
            output,
            device: InputDeviceKind::Keyboard,
        });
        self.events.push(BackendEvent::NewInput {
            output,
            device: InputDeviceKind::Pointer,
        });
    }

    // =========================================================================
    // Loop-Thread Integration
    // =========================================================================

    /// Event-bridge readiness fd for the compositor's poll loop.
    pub fn event_fd(&self) -> RawFd {
        self.bridge.wake_fd()
    }

    /// Completion readiness fd of one output.
    pub fn completion_fd(&self, id: OutputId) -> Option<RawFd> {
        self.outputs.get(&id).map(|output| output.completion_fd())
    }

    /// Consume one wake unit and route the matching host event. Returns
    /// false once no wake unit is pending.
    pub fn dispatch_one(&mut self) -> bool {
        let Some(item) = self.bridge.poll_one() else {
            return false;
        };
        match item {
            BridgeItem::Disconnected => {
                tracing::error!("host connection lost; requesting backend teardown");
                self.events.push(BackendEvent::ConnectionLost);
            }
            BridgeItem::Event(event) => self.route(event),
        }
        true
    }

    /// Drain every pending host event. Returns how many wake units were
    /// consumed.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while self.dispatch_one() {
            dispatched += 1;
        }
        dispatched
    }

    fn route(&mut self, event: HostEvent) {
        let target = self
            .outputs
            .iter()
            .find(|(_, output)| output.host_surface() == event.surface)
            .map(|(id, _)| *id);
        let Some(id) = target else {
            tracing::debug!("discarding event for unknown host surface {:?}", event.surface);
            return;
        };

        let mut remove = false;
        if let Some(output) = self.outputs.get_mut(&id) {
            remove = output.handle_activity_event(&event, &mut self.events)
                == Disposition::RemoveOutput;
        }
        if remove {
            self.remove_output(id);
        }
    }

    /// Recycle one output's completed buffers and queue its report pair.
    pub fn process_completions(&mut self, id: OutputId) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.process_completions(&mut self.events);
        }
    }

    /// Recycle every output's completed buffers.
    pub fn process_all_completions(&mut self) {
        for id in self.output_ids() {
            self.process_completions(id);
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Take all pending events (clears the internal queue)
    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{HostEventKind, TouchAction, TouchPoint, TouchSample};
    use crate::host::api::{HostSurfaceId, StubHostConnection};

    fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    fn backend(stub: &Arc<StubHostConnection>) -> Backend {
        let config = BackendConfig {
            frame_interval: Duration::from_millis(1),
            ..Default::default()
        };
        Backend::new(stub.clone(), config).unwrap()
    }

    fn touch(surface: HostSurfaceId, action: TouchAction, x: f64, y: f64) -> HostEvent {
        HostEvent {
            surface,
            kind: HostEventKind::Touch(TouchSample {
                action,
                points: vec![TouchPoint { id: 1, x, y }],
                changed: 0,
            }),
        }
    }

    #[test]
    fn test_start_announces_existing_outputs() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        let id = backend.add_output().unwrap();
        assert!(!backend.has_events());

        backend.start().unwrap();
        assert_eq!(
            backend.take_events(),
            vec![
                BackendEvent::NewOutput { output: id },
                BackendEvent::NewInput {
                    output: id,
                    device: InputDeviceKind::Keyboard,
                },
                BackendEvent::NewInput {
                    output: id,
                    device: InputDeviceKind::Pointer,
                },
            ]
        );
        assert!(backend.start().is_err(), "double start must be rejected");
    }

    #[test]
    fn test_output_added_after_start_is_announced() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        backend.start().unwrap();
        assert!(backend.take_events().is_empty());

        let id = backend.add_output().unwrap();
        let events = backend.take_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], BackendEvent::NewOutput { output: id });
    }

    #[test]
    fn test_dispatch_routes_touch_to_pointer_events() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        let id = backend.add_output().unwrap();
        backend.start().unwrap();
        backend.take_events();

        let surface = backend.output(id).unwrap().host_surface();
        stub.push_event(touch(surface, TouchAction::Down, 100.0, 100.0));
        stub.push_event(touch(surface, TouchAction::Up, 100.0, 100.0));

        let mut dispatched = 0;
        wait_for(|| {
            dispatched += backend.dispatch_pending();
            dispatched == 2
        });

        // a quick tap reaches the compositor as a left click
        let events = backend.take_events();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            BackendEvent::Pointer { output, .. } if output == id
        ));
    }

    #[test]
    fn test_event_for_unknown_surface_is_discarded() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        backend.add_output().unwrap();
        backend.start().unwrap();
        backend.take_events();

        stub.push_event(touch(
            HostSurfaceId(999),
            TouchAction::Down,
            100.0,
            100.0,
        ));

        let mut dispatched = 0;
        wait_for(|| {
            dispatched += backend.dispatch_pending();
            dispatched == 1
        });
        assert!(!backend.has_events());
    }

    #[test]
    fn test_remote_destroy_removes_output() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        let id = backend.add_output().unwrap();
        backend.start().unwrap();
        backend.take_events();

        let surface = backend.output(id).unwrap().host_surface();
        stub.push_event(HostEvent {
            surface,
            kind: HostEventKind::Destroyed,
        });

        let mut dispatched = 0;
        wait_for(|| {
            dispatched += backend.dispatch_pending();
            dispatched == 1
        });

        assert!(backend.output(id).is_none());
        assert_eq!(
            backend.take_events(),
            vec![BackendEvent::OutputRemoved { output: id }]
        );
        assert_eq!(stub.destroyed_surfaces(), vec![surface]);
    }

    #[test]
    fn test_connection_loss_requests_teardown() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        backend.add_output().unwrap();
        backend.start().unwrap();
        backend.take_events();

        stub.close();
        wait_for(|| {
            backend.dispatch_pending();
            backend.has_events()
        });
        assert!(backend
            .take_events()
            .contains(&BackendEvent::ConnectionLost));

        // the compositor reacts by destroying the backend; the receiver
        // has already exited, so this returns promptly
        backend.destroy();
    }

    #[test]
    fn test_stop_tears_down_outputs() {
        let stub = StubHostConnection::new();
        let mut backend = backend(&stub);
        let id = backend.add_output().unwrap();
        backend.start().unwrap();
        backend.take_events();

        backend.stop().unwrap();
        assert_eq!(backend.output_count(), 0);
        assert_eq!(
            backend.take_events(),
            vec![BackendEvent::OutputRemoved { output: id }]
        );
        assert!(backend.stop().is_err());
    }
}
