//! Command-line interface definitions for sso-creds.
//!
//! This module defines the CLI structure using clap derives and dispatches the
//! parsed command to its handler in [`crate::commands`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::color::ColorScheme;
use crate::commands::accounts::handle_accounts_command;
use crate::commands::completions::{Shell, handle_completions_command};
use crate::commands::credentials::handle_credentials_command;
use crate::commands::version::handle_version_command;
use crate::error::exit_code;
use crate::format::ExportFormat;

/// sso-creds - Short-lived AWS credentials through IAM Identity Center
#[derive(Debug, Parser)]
#[command(
  name = "sso-creds",
  version,
  about = "Fetch short-lived AWS credentials through IAM Identity Center",
  long_about = "Signs in to AWS IAM Identity Center with the device-authorization flow and exchanges the\n\
                session for temporary role credentials, printed as shell exports or merged into an AWS\n\
                credentials file.",
  styles = get_clap_styles()
)]
pub struct Cli {
  /// Subcommand to execute
  #[command(subcommand)]
  pub command: Command,

  /// Configuration sources
  #[command(flatten)]
  pub settings: SettingsOptions,

  /// Behavior options
  #[command(flatten)]
  pub behavior: BehaviorOptions,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Retrieve temporary credentials for an account
  Credentials(CredentialsArgs),

  /// List the configured accounts
  Accounts,

  /// Display version and build information
  Version {
    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Show only version number
    #[arg(long)]
    short: bool,
  },

  /// Generate shell completion scripts
  Completions {
    /// Target shell for completions
    #[arg(value_enum)]
    shell: Shell,
  },
}

/// Options for `sso-creds credentials`
#[derive(Debug, Args)]
pub struct CredentialsArgs {
  /// Account name from the accounts file (defaults to the default account)
  #[arg(short, long, value_name = "NAME")]
  pub account: Option<String>,

  /// Output syntax
  #[arg(
    short = 'f',
    long,
    value_enum,
    default_value_t = ExportFormat::Bash,
    value_name = "FORMAT"
  )]
  pub export_format: ExportFormat,

  /// Write to this file instead of stdout
  #[arg(short, long, value_name = "PATH")]
  pub output_file: Option<PathBuf>,

  /// Section name for the credentials-file format (defaults to the account name)
  #[arg(long, value_name = "NAME")]
  pub profile: Option<String>,

  /// Pick the account from a numbered list
  #[arg(long, conflicts_with = "account")]
  pub choose: bool,

  /// Do not fall back to `aws sso login` when device authorization fails
  #[arg(long)]
  pub no_fallback: bool,

  /// Check the credentials with `aws sts get-caller-identity` (warns only)
  #[arg(long)]
  pub verify: bool,
}

/// Configuration sources
#[derive(Debug, Args)]
pub struct SettingsOptions {
  /// .env file with AWS_SSO_START_URL / AWS_SSO_REGION / AWS_DEFAULT_REGION
  #[arg(long, global = true, value_name = "PATH")]
  pub env_file: Option<PathBuf>,

  /// YAML file listing the AWS accounts
  #[arg(long, global = true, value_name = "PATH")]
  pub accounts_file: Option<PathBuf>,

  /// Request timeout in seconds
  #[arg(long, global = true, default_value = "30", value_name = "SECONDS")]
  pub timeout: u64,
}

/// Behavior options
#[derive(Debug, Args)]
pub struct BehaviorOptions {
  /// Increase verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Suppress all output except errors
  #[arg(short, long, global = true, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Colorize output
  #[arg(long, global = true, value_enum, default_value = "auto", value_name = "WHEN")]
  pub color: ColorOption,
}

/// Color output options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
  Auto,
  Always,
  Never,
}

impl Cli {
  /// Validate CLI arguments
  ///
  /// Returns an error if the CLI configuration is invalid.
  pub fn validate(&self) -> Result<(), String> {
    if self.settings.timeout == 0 {
      return Err("--timeout must be at least 1 second".to_string());
    }

    if let Command::Credentials(args) = &self.command {
      if let Some(profile) = &args.profile
        && (profile.trim().is_empty() || profile.contains(['[', ']', '\n', '\r']))
      {
        return Err(format!("--profile '{profile}' is not a valid section name"));
      }

      if args.profile.is_some() && args.export_format.is_shell() {
        return Err("--profile only applies to --export-format credentials-file".to_string());
      }
    }

    Ok(())
  }
}

/// Parse CLI arguments, initialize shared services, and dispatch to the chosen
/// command.
pub async fn run() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let _ = e.print();
      // Help and --version go to stdout and are not failures.
      return if e.use_stderr() {
        ExitCode::from(exit_code::INVALID_ARGUMENTS)
      } else {
        ExitCode::SUCCESS
      };
    }
  };

  init_tracing(&cli.behavior);

  let colors = ColorScheme::new(cli.behavior.color);

  if let Err(e) = cli.validate() {
    eprintln!("{} {}", colors.error("Error:"), e);
    return ExitCode::from(exit_code::INVALID_ARGUMENTS);
  }

  match &cli.command {
    Command::Credentials(args) => handle_credentials_command(args, &cli, &colors).await,
    Command::Accounts => handle_accounts_command(&cli, &colors),
    Command::Version { json, short } => handle_version_command(*json, *short, &colors),
    Command::Completions { shell } => {
      handle_completions_command(*shell);
      ExitCode::SUCCESS
    }
  }
}

fn init_tracing(behavior: &BehaviorOptions) {
  let level = if behavior.quiet {
    LevelFilter::ERROR
  } else {
    match behavior.verbose {
      0 => LevelFilter::WARN,
      1 => LevelFilter::INFO,
      2 => LevelFilter::DEBUG,
      _ => LevelFilter::TRACE,
    }
  };

  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .try_init();
}

/// Get custom styles for clap help output
fn get_clap_styles() -> clap::builder::Styles {
  use clap::builder::styling::{AnsiColor, Effects};

  clap::builder::Styles::styled()
    .header(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .literal(AnsiColor::BrightGreen.on_default())
    .placeholder(AnsiColor::BrightCyan.on_default())
    .error(AnsiColor::BrightRed.on_default() | Effects::BOLD)
    .valid(AnsiColor::BrightGreen.on_default())
    .invalid(AnsiColor::BrightRed.on_default())
}
