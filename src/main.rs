//! sso-creds - Short-lived AWS credentials through IAM Identity Center
//!
//! This is the main entry point for the CLI application.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
  sso_creds::cli::run().await
}
