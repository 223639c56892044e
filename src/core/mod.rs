pub mod errors;
pub mod queue;
pub mod wake;
pub mod buffer;
pub mod events;
pub mod input;
pub mod bridge;
pub mod pipeline;
pub mod output;
pub mod backend;

// Re-export key types
pub use backend::{Backend, BackendConfig};
pub use events::BackendEvent;
pub use output::{Mode, Output, OutputId, OutputState};
pub use queue::BlockingQueue;
