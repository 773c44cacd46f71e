//! `sso-creds credentials` handler.
//!
//! Wires the real collaborators (HTTP client, terminal prompts, AWS CLI
//! fallback) into a [`CredentialRetrieval`] and reports the outcome. Only the
//! rendered export is written to stdout; every status line goes to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::accounts::{AccountRegistry, accounts_file_path};
use crate::auth::{AwsCliLogin, DeviceAuthenticator, DeviceCodePrompt, FallbackAuthenticator, FallbackPolicy};
use crate::cli::{Cli, CredentialsArgs};
use crate::color::ColorScheme;
use crate::config::{aws_config_path, aws_sso_cache_dir, load_sso_config};
use crate::error::SsoError;
use crate::exchange::CredentialExchanger;
use crate::identity::IdentityOutcome;
use crate::orchestrator::{AccountSelector, CredentialRetrieval, Retrieval, RetrievalRequest};
use crate::output::Emitted;
use crate::sso::{DeviceAuthorization, SsoApi, SsoClient};

/// Retrieve credentials and translate the outcome into an exit code.
///
/// # Arguments
/// * `args` - Options of the `credentials` subcommand.
/// * `cli` - Parsed CLI carrying the configuration sources and timeout.
/// * `colors` - Shared color scheme used to render status output.
pub(crate) async fn handle_credentials_command(args: &CredentialsArgs, cli: &Cli, colors: &ColorScheme) -> ExitCode {
  match retrieve_credentials(args, cli, colors).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(error) => {
      report_error(&error, colors);
      ExitCode::from(error.exit_code())
    }
  }
}

async fn retrieve_credentials(args: &CredentialsArgs, cli: &Cli, colors: &ColorScheme) -> Result<(), SsoError> {
  let config =
    load_sso_config(cli.settings.env_file.as_deref()).map_err(|e| SsoError::Configuration(format!("{e:#}")))?;
  let accounts_path = accounts_file_path(cli.settings.accounts_file.as_deref());
  let registry = AccountRegistry::load(&accounts_path)?;
  debug!(path = %accounts_path.display(), accounts = registry.accounts().len(), "Loaded account registry");

  let client = SsoClient::new(&config.sso_region, cli.settings.timeout)
    .map_err(|e| SsoError::Configuration(format!("{e:#}")))?;
  let api: Arc<dyn SsoApi> = Arc::new(client);

  let primary = DeviceAuthenticator::new(api.clone(), Box::new(TerminalPrompt { colors: *colors }));
  let mut retrieval = CredentialRetrieval::new(config, registry, Box::new(primary), CredentialExchanger::new(api));

  if !args.no_fallback {
    match (aws_sso_cache_dir(), aws_config_path()) {
      (Some(cache_dir), Some(config_path)) => {
        let fallback = FallbackAuthenticator::new(cache_dir, Box::new(AwsCliLogin::new(config_path)));
        retrieval = retrieval.with_fallback(Box::new(fallback), FallbackPolicy::default());
      }
      _ => warn!("Home directory not found, AWS CLI fallback unavailable"),
    }
  }

  if args.choose {
    retrieval = retrieval.with_selector(Box::new(NumberedPrompt));
  }

  if args.verify {
    match aws_config_path() {
      Some(config_path) => retrieval = retrieval.with_identity_check(Box::new(AwsCliLogin::new(config_path))),
      None => warn!("Home directory not found, skipping credential verification"),
    }
  }

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      interrupt.cancel();
    }
  });

  let request = RetrievalRequest {
    account: args.account.as_deref(),
    format: args.export_format,
    profile: args.profile.as_deref(),
    choose: args.choose,
  };

  let (result, emitted) = retrieval.run(&request, args.output_file.as_deref(), &cancel).await?;
  print_summary(&result, &emitted, colors);
  Ok(())
}

fn print_summary(result: &Retrieval, emitted: &Emitted, colors: &ColorScheme) {
  let credentials = &result.credentials;

  eprintln!(
    "{} {} {}",
    colors.success("✓"),
    colors.success("Credentials retrieved for"),
    colors.emphasis(&result.account)
  );
  eprintln!("  {}: {}", colors.emphasis("Role"), credentials.role_name);
  eprintln!("  {}: {}", colors.emphasis("Access key"), colors.code(credentials.access_key_id.masked()));
  eprintln!(
    "  {}: {} ({})",
    colors.emphasis("Expires"),
    colors.number(credentials.time_until_expiry()),
    colors.dimmed(credentials.expiration.format("%Y-%m-%d %H:%M:%S UTC"))
  );

  match &result.identity {
    Some(IdentityOutcome::Confirmed(identity)) => {
      eprintln!("  {}: {}", colors.emphasis("Identity"), colors.code(&identity.arn));
    }
    Some(IdentityOutcome::Mismatch(identity)) => eprintln!(
      "  {} credentials belong to account {} ({})",
      colors.warning("⚠"),
      colors.emphasis(&identity.account),
      identity.arn
    ),
    Some(IdentityOutcome::Unverified(reason)) => {
      eprintln!("  {} could not verify credentials: {reason}", colors.warning("⚠"));
    }
    None => {}
  }

  if let Emitted::File { path, merged } = emitted {
    let action = if *merged { "Updated" } else { "Wrote" };
    eprintln!("  {}: {}", colors.emphasis(action), colors.path(path.display()));
  }
}

fn report_error(error: &SsoError, colors: &ColorScheme) {
  eprintln!("{} {}: {}", colors.error("✗"), colors.error(error.category()), error);

  if let SsoError::ManualActionRequired {
    verification_url,
    steps,
  } = error
  {
    eprintln!("\n{}", colors.warning("Automatic sign-in failed. Finish it by hand:"));
    eprintln!("  {}: {}", colors.emphasis("Verification URL"), colors.link(verification_url));
    for (index, step) in steps.iter().enumerate() {
      eprintln!("  {}. {}", index + 1, step);
    }
  }
}

/// Prints the device code and verification link to stderr.
struct TerminalPrompt {
  colors: ColorScheme,
}

impl DeviceCodePrompt for TerminalPrompt {
  fn present(&self, authorization: &DeviceAuthorization) {
    let colors = &self.colors;
    let url = authorization
      .verification_uri_complete
      .as_deref()
      .unwrap_or(&authorization.verification_uri);

    eprintln!("{} {}", colors.info("→"), colors.info("Sign in to AWS SSO"));
    eprintln!("  {}: {}", colors.emphasis("Open"), colors.link(url));
    eprintln!("  {}: {}", colors.emphasis("Code"), colors.code(&authorization.user_code));
    eprintln!(
      "  {}",
      colors.dimmed(format!(
        "Waiting for approval (code expires in {} minutes)...",
        authorization.expires_in.div_ceil(60)
      ))
    );
  }
}

/// Numbered account list on stderr, answered by typing a number.
struct NumberedPrompt;

impl AccountSelector for NumberedPrompt {
  fn select(&self, registry: &AccountRegistry) -> anyhow::Result<Option<usize>> {
    use anyhow::Context;

    eprintln!("Available AWS accounts:");
    for line in numbered_choices(registry) {
      eprintln!("  {line}");
    }

    let count = registry.accounts().len();
    let choice = Input::<usize>::with_theme(&ColorfulTheme::default())
      .with_prompt("Select account")
      .default(registry.default_index() + 1)
      .validate_with(|input: &usize| {
        if (1..=count).contains(input) {
          Ok(())
        } else {
          Err(format!("Enter a number between 1 and {count}"))
        }
      })
      .interact_text()
      .context("Failed to read account selection")?;

    Ok(Some(choice - 1))
  }
}

fn numbered_choices(registry: &AccountRegistry) -> Vec<String> {
  registry
    .accounts()
    .iter()
    .enumerate()
    .map(|(index, account)| format!("{}. {account}", index + 1))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_numbered_choices_mark_default() {
    let registry = AccountRegistry::from_yaml(
      r#"
accounts:
  - name: dev
    account_id: "111111111111"
    email: dev@example.com
    is_default: true
  - name: prod
    account_id: "222222222222"
    email: prod@example.com
"#,
    )
    .unwrap();

    insta::assert_snapshot!(numbered_choices(&registry).join("\n"), @r###"
    1. dev (111111111111) [default]
    2. prod (222222222222)
    "###);
  }
}
