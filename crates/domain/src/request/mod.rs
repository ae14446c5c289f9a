//! Request types

mod headers;
mod method;
mod spec;

pub use headers::{AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use spec::ApiRequest;
