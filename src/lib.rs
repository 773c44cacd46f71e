//! sso-creds library
//!
//! Obtains short-lived AWS role credentials through the IAM Identity Center
//! device-authorization flow and renders them as shell exports or an AWS
//! credentials-file section.

pub mod accounts;
pub mod auth;
pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod format;
pub mod identity;
pub mod orchestrator;
pub mod output;
pub mod retry;
pub mod secret;
pub mod session;
pub mod sso;
