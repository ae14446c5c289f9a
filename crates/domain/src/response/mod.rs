//! Response types

mod envelope;
mod spec;
mod status;

pub use envelope::ApiEnvelope;
pub use spec::ApiResponse;
pub use status::StatusCode;
