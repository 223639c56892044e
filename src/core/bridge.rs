//! Cross-thread event bridge.
//!
//! One receiver thread per host connection blocks on the external receive
//! call and feeds a queue; the loop thread drains it cooperatively. The
//! wake fd counts in semaphore mode, so the loop thread observes exactly
//! one wake unit per queued item and pulls exactly one item per wake —
//! never more, never fewer.
//!
//! Teardown contract: close the host connection first (forces the blocking
//! receive to return), then `join()`; the queue and wake fd outlive the
//! receiver thread by construction.

use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::core::events::HostEvent;
use crate::core::queue::BlockingQueue;
use crate::core::wake::WakeFd;
use crate::host::api::HostConnection;

/// One item handed from the receiver thread to the loop thread.
#[derive(Debug)]
pub enum BridgeItem {
    Event(HostEvent),
    /// The blocking receive reported connection loss. Sole trigger for
    /// full backend teardown.
    Disconnected,
}

pub struct EventBridge {
    queue: Arc<BlockingQueue<BridgeItem>>,
    wake: Arc<WakeFd>,
    thread: Option<JoinHandle<()>>,
}

impl EventBridge {
    pub fn spawn(conn: Arc<dyn HostConnection>) -> std::io::Result<Self> {
        let queue = Arc::new(BlockingQueue::new());
        let wake = Arc::new(WakeFd::semaphore()?);

        let thread = {
            let queue = queue.clone();
            let wake = wake.clone();
            std::thread::Builder::new()
                .name("host-recv".into())
                .spawn(move || receive_loop(conn, queue, wake))?
        };

        Ok(Self {
            queue,
            wake,
            thread: Some(thread),
        })
    }

    /// Readiness fd for the compositor's poll loop, one unit per item.
    pub fn wake_fd(&self) -> RawFd {
        self.wake.as_raw_fd()
    }

    /// Consume one wake unit and pull the matching item. Loop thread only.
    pub fn poll_one(&self) -> Option<BridgeItem> {
        self.wake.consume()?;
        self.queue.pull(false)
    }

    /// Join the receiver thread. The host connection must already be
    /// closed, otherwise the blocking receive never returns.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("receiver thread panicked");
            }
        }
    }
}

fn receive_loop(
    conn: Arc<dyn HostConnection>,
    queue: Arc<BlockingQueue<BridgeItem>>,
    wake: Arc<WakeFd>,
) {
    loop {
        match conn.recv_event() {
            Ok(event) => {
                queue.push(BridgeItem::Event(event));
                if let Err(err) = wake.signal(1) {
                    // the loop thread will never learn about this item
                    tracing::error!("event loss: wake signal failed: {}", err);
                }
            }
            Err(err) => {
                tracing::info!("host receive ended: {}", err);
                queue.push(BridgeItem::Disconnected);
                let _ = wake.signal(1);
                break;
            }
        }
    }
}
