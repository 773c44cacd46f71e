//! CLI subcommand handlers.
//!
//! One module per `sso-creds` subcommand, keeping `cli.rs` limited to argument
//! definitions and dispatch.

pub mod accounts;
pub mod completions;
pub mod credentials;
pub mod version;
