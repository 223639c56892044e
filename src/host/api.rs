//! Host Connection API
//!
//! This trait defines what a host-process transport must implement: one
//! blocking event receive plus per-surface control and present operations.
//! Real transports speak the host's wire protocol; the loopback stub below
//! backs the demo binary and the test suite.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use thiserror::Error;

use crate::core::events::HostEvent;

/// Host-side window ("activity") identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostSurfaceId(pub u32);

/// Host-side render target inside a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostViewId(pub u32);

/// Result codes reported by the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("host connection lost")]
    ConnectionLost,

    /// The surface this request targeted no longer exists on the host.
    /// Callers treat this as surface teardown, not a failure.
    #[error("host target destroyed")]
    TargetDestroyed,

    #[error("host out of memory")]
    NoMemory,

    #[error("host rejected request: {0}")]
    Rejected(String),
}

pub type HostResult<T = ()> = std::result::Result<T, HostError>;

/// Screen geometry reported by the host for one surface.
#[derive(Debug, Clone, Copy)]
pub struct HostConfiguration {
    pub screen_width: u32,
    pub screen_height: u32,
    pub density: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsetKind {
    NavigationBar,
    StatusBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsetBehaviour {
    Transient,
    Hidden,
}

/// Placement policy when the buffer aspect does not match the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    CenterAxis,
    Stretch,
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceViewConfig {
    pub background: u32,
    pub mismatch_x: MismatchPolicy,
    pub mismatch_y: MismatchPolicy,
    pub dpi: u32,
}

impl Default for SurfaceViewConfig {
    fn default() -> Self {
        Self {
            background: 0,
            mismatch_x: MismatchPolicy::CenterAxis,
            mismatch_y: MismatchPolicy::CenterAxis,
            dpi: 120,
        }
    }
}

/// Transport to the host process.
///
/// `recv_event` blocks and is called from the backend's dedicated receiver
/// thread; everything else may be called from the loop thread or a
/// presenting thread concurrently, so implementations synchronize
/// internally.
pub trait HostConnection: Send + Sync {
    /// Block until the host delivers the next event. Returns
    /// `HostError::ConnectionLost` when the connection is gone; the caller
    /// treats that as the end of the receive loop.
    fn recv_event(&self) -> HostResult<HostEvent>;

    fn create_surface(&self) -> HostResult<HostSurfaceId>;
    fn destroy_surface(&self, surface: HostSurfaceId) -> HostResult;
    fn set_orientation(&self, surface: HostSurfaceId, orientation: Orientation) -> HostResult;
    fn configure_insets(
        &self,
        surface: HostSurfaceId,
        inset: InsetKind,
        behaviour: InsetBehaviour,
    ) -> HostResult;
    fn create_surface_view(&self, surface: HostSurfaceId) -> HostResult<HostViewId>;
    fn configure_surface_view(
        &self,
        surface: HostSurfaceId,
        view: HostViewId,
        config: SurfaceViewConfig,
    ) -> HostResult;
    fn set_touch_delivery(
        &self,
        surface: HostSurfaceId,
        view: HostViewId,
        enabled: bool,
    ) -> HostResult;
    fn set_focus(&self, surface: HostSurfaceId, view: HostViewId, force_soft_input: bool)
        -> HostResult;
    fn configuration(&self, surface: HostSurfaceId) -> HostResult<HostConfiguration>;

    /// Hand one finished buffer to the host for display. Blocks until the
    /// host has taken it over.
    fn present_buffer(
        &self,
        surface: HostSurfaceId,
        view: HostViewId,
        buffer_id: u64,
    ) -> HostResult;

    /// Tear the connection down. Any thread blocked in `recv_event` must
    /// observe `ConnectionLost` afterwards.
    fn close(&self);
}

/// Log-and-continue wrapper for host calls whose failure is not fatal.
macro_rules! try_host {
    ($call:expr) => {
        if let Err(err) = $call {
            tracing::error!("{} failed: {}", stringify!($call), err);
        }
    };
}
pub(crate) use try_host;

// ============================================================================
// Loopback Stub
// ============================================================================

#[derive(Debug, Default)]
struct StubState {
    pending: VecDeque<HostEvent>,
    closed: bool,
    next_surface: u32,
    next_view: u32,
    presented: Vec<(HostSurfaceId, u64)>,
    present_error: Option<HostError>,
    focus_requests: Vec<HostSurfaceId>,
    destroyed_surfaces: Vec<HostSurfaceId>,
}

/// In-process host stand-in for the demo binary and tests.
///
/// Events are scripted with `push_event`; `recv_event` blocks until one is
/// available or the connection is closed. Present calls are recorded so
/// callers can assert what reached the "screen".
pub struct StubHostConnection {
    state: Mutex<StubState>,
    cond: Condvar,
    screen: HostConfiguration,
}

impl StubHostConnection {
    pub fn new() -> std::sync::Arc<Self> {
        Self::with_screen(HostConfiguration {
            screen_width: 1080,
            screen_height: 2400,
            density: 1.0,
        })
    }

    pub fn with_screen(screen: HostConfiguration) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            state: Mutex::new(StubState::default()),
            cond: Condvar::new(),
            screen,
        })
    }

    /// Queue one scripted host event for the receiver thread.
    pub fn push_event(&self, event: HostEvent) {
        let mut state = self.state.lock().unwrap();
        state.pending.push_back(event);
        self.cond.notify_all();
    }

    /// Make the next `present_buffer` calls fail with `err`.
    pub fn fail_presents_with(&self, err: HostError) {
        self.state.lock().unwrap().present_error = Some(err);
    }

    pub fn presented(&self) -> Vec<(HostSurfaceId, u64)> {
        self.state.lock().unwrap().presented.clone()
    }

    pub fn present_count(&self) -> usize {
        self.state.lock().unwrap().presented.len()
    }

    pub fn focus_request_count(&self) -> usize {
        self.state.lock().unwrap().focus_requests.len()
    }

    pub fn destroyed_surfaces(&self) -> Vec<HostSurfaceId> {
        self.state.lock().unwrap().destroyed_surfaces.clone()
    }
}

impl HostConnection for StubHostConnection {
    fn recv_event(&self) -> HostResult<HostEvent> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Ok(event);
            }
            if state.closed {
                return Err(HostError::ConnectionLost);
            }
            state = self.cond.wait(state).unwrap();
        }
    }

    fn create_surface(&self) -> HostResult<HostSurfaceId> {
        let mut state = self.state.lock().unwrap();
        state.next_surface += 1;
        Ok(HostSurfaceId(state.next_surface))
    }

    fn destroy_surface(&self, surface: HostSurfaceId) -> HostResult {
        self.state.lock().unwrap().destroyed_surfaces.push(surface);
        Ok(())
    }

    fn set_orientation(&self, _surface: HostSurfaceId, _orientation: Orientation) -> HostResult {
        Ok(())
    }

    fn configure_insets(
        &self,
        _surface: HostSurfaceId,
        _inset: InsetKind,
        _behaviour: InsetBehaviour,
    ) -> HostResult {
        Ok(())
    }

    fn create_surface_view(&self, _surface: HostSurfaceId) -> HostResult<HostViewId> {
        let mut state = self.state.lock().unwrap();
        state.next_view += 1;
        Ok(HostViewId(state.next_view))
    }

    fn configure_surface_view(
        &self,
        _surface: HostSurfaceId,
        _view: HostViewId,
        _config: SurfaceViewConfig,
    ) -> HostResult {
        Ok(())
    }

    fn set_touch_delivery(
        &self,
        _surface: HostSurfaceId,
        _view: HostViewId,
        _enabled: bool,
    ) -> HostResult {
        Ok(())
    }

    fn set_focus(
        &self,
        surface: HostSurfaceId,
        _view: HostViewId,
        _force_soft_input: bool,
    ) -> HostResult {
        self.state.lock().unwrap().focus_requests.push(surface);
        Ok(())
    }

    fn configuration(&self, _surface: HostSurfaceId) -> HostResult<HostConfiguration> {
        Ok(self.screen)
    }

    fn present_buffer(
        &self,
        surface: HostSurfaceId,
        _view: HostViewId,
        buffer_id: u64,
    ) -> HostResult {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.present_error.clone() {
            return Err(err);
        }
        state.presented.push((surface, buffer_id));
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.cond.notify_all();
    }
}
