//! `sso-creds accounts`: print the account registry without touching the
//! network.

use std::process::ExitCode;

use crate::accounts::{AccountRegistry, accounts_file_path};
use crate::cli::Cli;
use crate::color::ColorScheme;

pub(crate) fn handle_accounts_command(cli: &Cli, colors: &ColorScheme) -> ExitCode {
  let path = accounts_file_path(cli.settings.accounts_file.as_deref());

  let registry = match AccountRegistry::load(&path) {
    Ok(registry) => registry,
    Err(e) => {
      eprintln!("{} {}: {}", colors.error("✗"), colors.error(e.category()), e);
      return ExitCode::from(e.exit_code());
    }
  };

  println!(
    "{} {}",
    colors.emphasis("Accounts from"),
    colors.path(path.display())
  );

  for (index, account) in registry.accounts().iter().enumerate() {
    let marker = if account.is_default {
      format!(" {}", colors.success("[default]"))
    } else {
      String::new()
    };

    println!(
      "\n{}. {}{}",
      colors.number(index + 1),
      colors.emphasis(&account.name),
      marker
    );
    println!("   {}: {}", colors.emphasis("Account ID"), colors.code(&account.account_id));
    println!("   {}: {}", colors.emphasis("Role"), account.role);
    println!("   {}: {}", colors.emphasis("Email"), account.email);
    if let Some(description) = &account.description {
      println!("   {}: {}", colors.emphasis("Description"), colors.dimmed(description));
    }
  }

  ExitCode::SUCCESS
}
