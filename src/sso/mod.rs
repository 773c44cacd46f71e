//! IAM Identity Center module providing the API abstraction, the HTTP client,
//! and wire models.

pub mod api;
pub mod client;
pub mod models;

pub use api::{ApiError, SsoApi};
pub use client::SsoClient;
pub use models::{DeviceAuthorization, RegisteredClient, RoleCredentials, TokenGrant, TokenPoll};
