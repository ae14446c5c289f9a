//! Authentication domain types

mod endpoints;
mod token;
mod user;

pub use endpoints::{AuthEndpoint, AuthEndpointSet};
pub use token::{AccessToken, Session};
pub use user::{CurrentUser, LoginCredentials, LoginPayload, MePayload, TokenPayload};
