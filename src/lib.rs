// Tioga
// Copyright (c) 2026
//
// Remote-host display/input backend for event-loop compositors.
// The compositor core stays single threaded; host receive and buffer
// presentation run on dedicated threads bridged by blocking queues
// and eventfd wakes.

pub mod core;
pub mod host;
pub mod util;
pub mod prelude;

// Re-export the compositor-facing surface at the crate root
pub use crate::core::backend::{Backend, BackendConfig};
pub use crate::core::errors::BackendError;
pub use crate::core::events::BackendEvent;
pub use crate::host::api::HostConnection;
