//! External Host Integration
//!
//! The host process owns the real screen and input hardware. The backend
//! talks to it through the `HostConnection` trait; the wire protocol
//! behind that trait is not this crate's concern.

pub mod api;

pub use api::{
    HostConfiguration, HostConnection, HostError, HostResult, HostSurfaceId, HostViewId,
    StubHostConnection,
};
