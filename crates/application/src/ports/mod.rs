//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session core and the outside
//! world. Adapters live in the infrastructure crate.

mod clock;
mod http_transport;

pub use clock::Clock;
pub use http_transport::{HttpTransport, TransportError};
