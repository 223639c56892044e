//! Per-output buffer presentation pipeline.
//!
//! The loop thread commits finished buffers; a dedicated presenting thread
//! pushes them to the host and parks them on an idle queue; the loop
//! thread recycles the idle queue when the completion wake fires. Buffers
//! always come back: teardown drains both queues and drops every
//! outstanding lock before the monitors go away.
//!
//! The run state only ever moves forward, `Running → Draining → Stopped`.
//! A stop sentinel in the present queue unblocks the presenting thread;
//! nothing is ever terminated forcibly.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::buffer::PresentBuffer;
use crate::core::errors::{BackendError, Result};
use crate::core::queue::BlockingQueue;
use crate::core::wake::WakeFd;
use crate::host::api::{HostConnection, HostError, HostSurfaceId, HostViewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    /// Shutdown requested or host target gone; the presenting thread is
    /// on its way out and remaining buffers only get recycled.
    Draining,
    Stopped,
}

/// Run state shared with the presenting thread. Acquire/release ordering
/// pairs every store with the queue traffic that follows it.
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    fn load(&self) -> PipelineState {
        match self.0.load(Ordering::Acquire) {
            0 => PipelineState::Running,
            1 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }

    fn store(&self, state: PipelineState) {
        let raw = match state {
            PipelineState::Running => 0,
            PipelineState::Draining => 1,
            PipelineState::Stopped => 2,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// Foreground flag plus the pacing monitor. A background presenting
/// thread sleeps here one frame interval at a time; flipping to
/// foreground wakes it immediately so queued frames present right away.
struct Foreground {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Foreground {
    fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn set(&self, foreground: bool) {
        let mut flag = self.flag.lock().unwrap();
        *flag = foreground;
        if foreground {
            self.cond.notify_all();
        }
    }

    fn get(&self) -> bool {
        *self.flag.lock().unwrap()
    }

    /// One pacing sleep: waits out `interval` unless foreground (or a
    /// shutdown wake) arrives first.
    fn pace(&self, interval: Duration) {
        let flag = self.flag.lock().unwrap();
        if !*flag {
            let _ = self.cond.wait_timeout(flag, interval).unwrap();
        }
    }

    fn wake(&self) {
        self.cond.notify_all();
    }
}

enum PresentItem {
    Buffer(PresentBuffer),
    /// Unblocks a waiting pull during shutdown.
    Stop,
}

struct PresentContext {
    conn: Arc<dyn HostConnection>,
    surface: HostSurfaceId,
    /// Host view id, 0 until the host reports view creation.
    view: Arc<AtomicU32>,
    present: Arc<BlockingQueue<PresentItem>>,
    idle: Arc<BlockingQueue<PresentBuffer>>,
    state: Arc<SharedState>,
    foreground: Arc<Foreground>,
    completion: Arc<WakeFd>,
    frame_interval: Duration,
}

fn present_loop(ctx: PresentContext) {
    while ctx.state.load() == PipelineState::Running {
        let buffer = match ctx.present.pull(true) {
            Some(PresentItem::Buffer(buffer)) => buffer,
            Some(PresentItem::Stop) | None => continue,
        };

        let view = ctx.view.load(Ordering::Acquire);
        if ctx.foreground.get() && view != 0 {
            match ctx
                .conn
                .present_buffer(ctx.surface, HostViewId(view), buffer.id())
            {
                Ok(()) => {}
                Err(HostError::TargetDestroyed) => {
                    tracing::info!(
                        "host surface {:?} destroyed, draining presentation",
                        ctx.surface
                    );
                    ctx.state.store(PipelineState::Draining);
                }
                Err(err) => {
                    tracing::error!("present on host surface {:?} failed: {}", ctx.surface, err);
                }
            }
        } else {
            // off screen: pace one frame instead of pushing to the host
            ctx.foreground.pace(ctx.frame_interval);
        }

        ctx.idle.push(buffer);
        if let Err(err) = ctx.completion.signal(1) {
            tracing::error!("completion wake failed: {}", err);
        }
    }
}

pub struct PresentationPipeline {
    present: Arc<BlockingQueue<PresentItem>>,
    idle: Arc<BlockingQueue<PresentBuffer>>,
    state: Arc<SharedState>,
    foreground: Arc<Foreground>,
    completion: Arc<WakeFd>,
    view: Arc<AtomicU32>,
    thread: Option<JoinHandle<()>>,
}

impl PresentationPipeline {
    /// Spawn the presenting thread for one host surface.
    pub fn spawn(
        conn: Arc<dyn HostConnection>,
        surface: HostSurfaceId,
        frame_interval: Duration,
    ) -> std::io::Result<Self> {
        let present = Arc::new(BlockingQueue::new());
        let idle = Arc::new(BlockingQueue::new());
        let state = Arc::new(SharedState::new());
        let foreground = Arc::new(Foreground::new());
        let completion = Arc::new(WakeFd::counter()?);
        let view = Arc::new(AtomicU32::new(0));

        let ctx = PresentContext {
            conn,
            surface,
            view: view.clone(),
            present: present.clone(),
            idle: idle.clone(),
            state: state.clone(),
            foreground: foreground.clone(),
            completion: completion.clone(),
            frame_interval,
        };
        let thread = std::thread::Builder::new()
            .name(format!("present-{}", surface.0))
            .spawn(move || present_loop(ctx))?;

        Ok(Self {
            present,
            idle,
            state,
            foreground,
            completion,
            view,
            thread: Some(thread),
        })
    }

    /// Queue one finished buffer. Loop thread only; takes one lock that the
    /// recycle step returns.
    pub fn commit(&self, buffer: &PresentBuffer) -> Result<()> {
        if self.state.load() != PipelineState::Running {
            return Err(BackendError::state_error(
                "presentation pipeline is not running",
            ));
        }
        buffer.acquire();
        self.present.push(PresentItem::Buffer(buffer.clone()));
        Ok(())
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.set(foreground);
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.get()
    }

    /// Publish the host view once the host reports its creation.
    pub fn set_view(&self, view: HostViewId) {
        self.view.store(view.0, Ordering::Release);
    }

    pub fn view(&self) -> Option<HostViewId> {
        let raw = self.view.load(Ordering::Acquire);
        (raw != 0).then_some(HostViewId(raw))
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    /// Completion readiness fd for the compositor's poll loop.
    pub fn completion_fd(&self) -> std::os::unix::io::RawFd {
        self.completion.as_raw_fd()
    }

    /// Recycle everything on the idle queue in one pass, returning each
    /// buffer's lock. Loop thread only. Returns the number recycled.
    pub fn recycle(&self) -> usize {
        while self.completion.consume().is_some() {}
        let buffers = self.idle.drain();
        let recycled = buffers.len();
        for buffer in buffers {
            buffer.release();
        }
        recycled
    }

    /// Stop the presenting thread and return every outstanding buffer
    /// lock. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.state.store(PipelineState::Draining);
        self.present.push(PresentItem::Stop);
        self.foreground.wake();
        if thread.join().is_err() {
            tracing::error!("presenting thread panicked during shutdown");
        }

        for item in self.present.drain() {
            if let PresentItem::Buffer(buffer) = item {
                buffer.release();
            }
        }
        for buffer in self.idle.drain() {
            buffer.release();
        }
        self.state.store(PipelineState::Stopped);
    }
}

impl Drop for PresentationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn pipeline_with_interval(
        stub: &Arc<StubHostConnection>,
        interval: Duration,
    ) -> PresentationPipeline {
        PresentationPipeline::spawn(stub.clone(), HostSurfaceId(1), interval).unwrap()
    }

    #[test]
    fn test_foreground_presents_in_commit_order() {
        let stub = StubHostConnection::new();
        let pipeline = pipeline_with_interval(&stub, Duration::from_millis(1));
        pipeline.set_view(HostViewId(1));
        pipeline.set_foreground(true);

        let buffers: Vec<_> = (1..=3).map(|i| PresentBuffer::new(i, 64, 64)).collect();
        for buffer in &buffers {
            pipeline.commit(buffer).unwrap();
        }

        wait_for(|| stub.present_count() == 3);
        let ids: Vec<u64> = stub.presented().iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        wait_for(|| {
            pipeline.recycle();
            buffers.iter().all(|b| b.lock_count() == 0)
        });
    }

    #[test]
    fn test_background_commits_recycle_without_presents() {
        let stub = StubHostConnection::new();
        let pipeline = pipeline_with_interval(&stub, Duration::from_millis(1));
        pipeline.set_view(HostViewId(1));

        let buffers: Vec<_> = (1..=4).map(|i| PresentBuffer::new(i, 64, 64)).collect();
        for buffer in &buffers {
            pipeline.commit(buffer).unwrap();
        }

        let mut recycled = 0;
        wait_for(|| {
            recycled += pipeline.recycle();
            recycled == 4
        });
        assert_eq!(stub.present_count(), 0, "background must not present");
        assert!(buffers.iter().all(|b| b.lock_count() == 0));
    }

    #[test]
    fn test_shutdown_returns_every_lock() {
        let stub = StubHostConnection::new();
        // long interval so buffers pile up behind the pacing sleep
        let mut pipeline = pipeline_with_interval(&stub, Duration::from_millis(200));
        pipeline.set_view(HostViewId(1));

        let buffers: Vec<_> = (1..=5).map(|i| PresentBuffer::new(i, 64, 64)).collect();
        for buffer in &buffers {
            pipeline.commit(buffer).unwrap();
        }
        pipeline.shutdown();

        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(
            buffers.iter().all(|b| b.lock_count() == 0),
            "teardown must recycle queued and in-flight buffers exactly once"
        );
        assert!(pipeline.commit(&buffers[0]).is_err());
    }

    #[test]
    fn test_target_destroyed_drains_but_still_recycles() {
        let stub = StubHostConnection::new();
        let pipeline = pipeline_with_interval(&stub, Duration::from_millis(1));
        pipeline.set_view(HostViewId(1));
        pipeline.set_foreground(true);
        stub.fail_presents_with(HostError::TargetDestroyed);

        let buffer = PresentBuffer::new(9, 64, 64);
        pipeline.commit(&buffer).unwrap();

        wait_for(|| pipeline.state() == PipelineState::Draining);
        let mut recycled = 0;
        wait_for(|| {
            recycled += pipeline.recycle();
            recycled == 1
        });
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(stub.present_count(), 0);
    }

    #[test]
    fn test_foreground_transition_interrupts_pacing() {
        let stub = StubHostConnection::new();
        // pacing long enough that only the wake can explain a quick present
        let pipeline = pipeline_with_interval(&stub, Duration::from_secs(2));
        pipeline.set_view(HostViewId(1));

        let first = PresentBuffer::new(1, 64, 64);
        let second = PresentBuffer::new(2, 64, 64);
        pipeline.commit(&first).unwrap();
        pipeline.commit(&second).unwrap();

        // let the thread settle into the pacing sleep, then flip foreground
        std::thread::sleep(Duration::from_millis(20));
        pipeline.set_foreground(true);

        wait_for(|| stub.present_count() >= 1);
        let mut recycled = 0;
        wait_for(|| {
            recycled += pipeline.recycle();
            recycled == 2
        });
    }
}
