//! Account definitions and the registry used to resolve them.
//!
//! The registry is validated eagerly when it is built: names must be unique
//! (case-insensitively) and exactly one account must carry the default flag.
//! A registry that exists is therefore always resolvable without a name.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::SsoError;

/// Environment variable pointing at the accounts YAML file.
pub const ACCOUNTS_FILE_VAR: &str = "SSO_CREDS_ACCOUNTS_FILE";

/// Accounts file used when neither the flag nor the environment names one.
pub const DEFAULT_ACCOUNTS_FILE: &str = "config/aws_accounts.yaml";

/// Role assumed when an account entry does not name one.
pub const DEFAULT_ROLE: &str = "Engineer";

/// An AWS account reachable through SSO. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
  pub name: String,
  pub account_id: String,
  pub email: String,
  #[serde(default = "default_role")]
  pub role: String,
  #[serde(default, alias = "default")]
  pub is_default: bool,
  #[serde(default)]
  pub description: Option<String>,
}

fn default_role() -> String {
  DEFAULT_ROLE.to_string()
}

impl Account {
  fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      bail!("Account name cannot be empty");
    }

    if self.account_id.len() != 12 || !self.account_id.chars().all(|c| c.is_ascii_digit()) {
      bail!(
        "Invalid AWS account ID for '{}': {}. Must be a 12-digit number",
        self.name,
        self.account_id
      );
    }

    if !self.email.contains('@') {
      bail!("Invalid email for '{}': {}", self.name, self.email);
    }

    if self.role.trim().is_empty() {
      bail!("Role cannot be empty for '{}'", self.name);
    }

    Ok(())
  }
}

impl fmt::Display for Account {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.account_id)?;
    if self.is_default {
      write!(f, " [default]")?;
    }
    Ok(())
  }
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
  accounts: Vec<Account>,
}

/// Validated, ordered collection of accounts.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
  accounts: Vec<Account>,
  default_index: usize,
}

impl AccountRegistry {
  /// Build a registry, enforcing uniqueness and a single default.
  ///
  /// # Errors
  /// Returns [`SsoError::Configuration`] for an empty list, an invalid entry,
  /// a duplicate name, or anything other than exactly one default account.
  pub fn new(accounts: Vec<Account>) -> Result<Self, SsoError> {
    if accounts.is_empty() {
      return Err(SsoError::Configuration("no AWS accounts configured".to_string()));
    }

    for (index, account) in accounts.iter().enumerate() {
      account
        .validate()
        .map_err(|e| SsoError::Configuration(e.to_string()))?;

      if accounts[..index]
        .iter()
        .any(|earlier| earlier.name.eq_ignore_ascii_case(&account.name))
      {
        return Err(SsoError::Configuration(format!(
          "duplicate account name '{}'",
          account.name
        )));
      }
    }

    let defaults: Vec<usize> = accounts
      .iter()
      .enumerate()
      .filter(|(_, account)| account.is_default)
      .map(|(index, _)| index)
      .collect();

    let default_index = match defaults.as_slice() {
      [index] => *index,
      [] => {
        return Err(SsoError::Configuration(
          "no default account configured; mark exactly one account with is_default: true".to_string(),
        ));
      }
      many => {
        let names: Vec<&str> = many.iter().map(|i| accounts[*i].name.as_str()).collect();
        return Err(SsoError::Configuration(format!(
          "multiple default accounts configured: {}",
          names.join(", ")
        )));
      }
    };

    Ok(Self {
      accounts,
      default_index,
    })
  }

  /// Parse and validate a registry from YAML text.
  pub fn from_yaml(text: &str) -> Result<Self, SsoError> {
    let file: AccountsFile = serde_yaml::from_str(text)
      .map_err(|e| SsoError::Configuration(format!("invalid AWS accounts configuration: {e}")))?;
    Self::new(file.accounts)
  }

  /// Load and validate a registry from a YAML file.
  pub fn load(path: &Path) -> Result<Self, SsoError> {
    let text = read_accounts_file(path).map_err(|e| SsoError::Configuration(format!("{e:#}")))?;
    Self::from_yaml(&text)
  }

  /// Resolve a requested account, or the default one when no name is given.
  ///
  /// # Errors
  /// Returns [`SsoError::AccountNotFound`] listing every known name when the
  /// requested account does not exist.
  pub fn resolve(&self, name: Option<&str>) -> Result<&Account, SsoError> {
    match name {
      None => Ok(self.default_account()),
      Some(requested) => self
        .accounts
        .iter()
        .find(|account| account.name.eq_ignore_ascii_case(requested.trim()))
        .ok_or_else(|| SsoError::AccountNotFound {
          requested: requested.to_string(),
          available: self.names(),
        }),
    }
  }

  pub fn default_account(&self) -> &Account {
    &self.accounts[self.default_index]
  }

  pub fn default_index(&self) -> usize {
    self.default_index
  }

  pub fn accounts(&self) -> &[Account] {
    &self.accounts
  }

  /// Account names in registry order.
  pub fn names(&self) -> Vec<String> {
    self.accounts.iter().map(|account| account.name.clone()).collect()
  }
}

/// Pick the accounts file: explicit path, then the environment, then the
/// conventional location under the working directory.
pub fn accounts_file_path(explicit: Option<&Path>) -> PathBuf {
  if let Some(path) = explicit {
    return path.to_path_buf();
  }

  std::env::var(ACCOUNTS_FILE_VAR)
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from(DEFAULT_ACCOUNTS_FILE))
}

fn read_accounts_file(path: &Path) -> Result<String> {
  std::fs::read_to_string(path).with_context(|| format!("AWS accounts configuration not found at {}", path.display()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn account(name: &str, is_default: bool) -> Account {
    Account {
      name: name.to_string(),
      account_id: "123456789012".to_string(),
      email: format!("{name}@example.com"),
      role: DEFAULT_ROLE.to_string(),
      is_default,
      description: None,
    }
  }

  #[test]
  fn test_resolve_none_returns_single_default() {
    let registry =
      AccountRegistry::new(vec![account("dev", false), account("staging", true), account("prod", false)]).unwrap();

    assert_eq!(registry.resolve(None).unwrap().name, "staging");
  }

  #[test]
  fn test_zero_defaults_fails_at_load_time() {
    let result = AccountRegistry::new(vec![account("dev", false), account("staging", false), account("prod", false)]);
    assert!(matches!(result, Err(SsoError::Configuration(_))));
  }

  #[test]
  fn test_two_defaults_fails_at_load_time() {
    let result = AccountRegistry::new(vec![account("dev", true), account("staging", false), account("prod", true)]);
    match result {
      Err(SsoError::Configuration(message)) => {
        assert!(message.contains("dev"));
        assert!(message.contains("prod"));
      }
      other => panic!("expected configuration error, got {other:?}"),
    }
  }

  #[test]
  fn test_resolve_unknown_name_lists_known_accounts() {
    let registry = AccountRegistry::new(vec![account("dev", true), account("staging", false)]).unwrap();

    match registry.resolve(Some("prod")) {
      Err(SsoError::AccountNotFound { requested, available }) => {
        assert_eq!(requested, "prod");
        assert_eq!(available, vec!["dev".to_string(), "staging".to_string()]);
      }
      other => panic!("expected AccountNotFound, got {other:?}"),
    }
  }

  #[test]
  fn test_resolve_is_case_insensitive() {
    let registry = AccountRegistry::new(vec![account("dev", true), account("Staging", false)]).unwrap();
    assert_eq!(registry.resolve(Some("staging")).unwrap().name, "Staging");
  }

  #[test]
  fn test_duplicate_names_rejected() {
    let result = AccountRegistry::new(vec![account("dev", true), account("DEV", false)]);
    assert!(matches!(result, Err(SsoError::Configuration(_))));
  }

  #[test]
  fn test_empty_registry_rejected() {
    assert!(matches!(AccountRegistry::new(vec![]), Err(SsoError::Configuration(_))));
  }

  #[test]
  fn test_invalid_account_id_rejected() {
    let mut bad = account("dev", true);
    bad.account_id = "1234".to_string();
    assert!(matches!(AccountRegistry::new(vec![bad]), Err(SsoError::Configuration(_))));
  }

  #[test]
  fn test_from_yaml_applies_defaults_and_alias() {
    let yaml = r#"
accounts:
  - name: dev
    account_id: "111111111111"
    email: dev@example.com
    default: true
    description: Development sandbox
  - name: prod
    account_id: "222222222222"
    email: prod@example.com
    role: ReadOnly
"#;

    let registry = AccountRegistry::from_yaml(yaml).unwrap();
    let dev = registry.resolve(None).unwrap();
    assert_eq!(dev.name, "dev");
    assert_eq!(dev.role, DEFAULT_ROLE);
    assert_eq!(dev.description.as_deref(), Some("Development sandbox"));
    assert_eq!(registry.resolve(Some("prod")).unwrap().role, "ReadOnly");
  }

  #[test]
  fn test_from_yaml_missing_accounts_key() {
    let result = AccountRegistry::from_yaml("profiles: []\n");
    assert!(matches!(result, Err(SsoError::Configuration(_))));
  }

  #[test]
  fn test_display_marks_default() {
    assert_eq!(account("dev", true).to_string(), "dev (123456789012) [default]");
    assert_eq!(account("prod", false).to_string(), "prod (123456789012)");
  }

  #[test]
  fn test_accounts_file_path_prefers_explicit() {
    let path = accounts_file_path(Some(Path::new("/tmp/accounts.yaml")));
    assert_eq!(path, PathBuf::from("/tmp/accounts.yaml"));
  }
}
