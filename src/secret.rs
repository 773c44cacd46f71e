//! Masked handling for secret material.
//!
//! Tokens, keys, and device codes are wrapped in [`Secret`] as soon as they
//! leave the wire layer. Both `Debug` and `Display` print the masked form, so a
//! stray `{:?}` in a log line cannot leak the value. The raw value is only
//! reachable through [`Secret::expose`], which the export renderer and the
//! HTTP client call.

use std::fmt;

/// Separator placed between the visible prefix and suffix of a masked value.
pub const MASK_SEPARATOR: &str = "…";

/// Rendering used for values too short to reveal any characters.
pub const SHORT_MASK: &str = "****";

/// Number of characters revealed at each end of a masked value.
const VISIBLE_CHARS: usize = 4;

/// Mask a secret value for display.
///
/// Values longer than eight characters keep their first and last four
/// characters joined by [`MASK_SEPARATOR`]; anything shorter collapses to
/// [`SHORT_MASK`].
///
/// # Arguments
/// * `value` - Raw secret to mask.
///
/// # Returns
/// A string that is safe to print or log.
pub fn mask(value: &str) -> String {
  let chars: Vec<char> = value.chars().collect();
  if chars.len() <= VISIBLE_CHARS * 2 {
    return SHORT_MASK.to_string();
  }

  let prefix: String = chars[..VISIBLE_CHARS].iter().collect();
  let suffix: String = chars[chars.len() - VISIBLE_CHARS..].iter().collect();
  format!("{prefix}{MASK_SEPARATOR}{suffix}")
}

/// A string value that must never be printed in full outside an export.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
  /// Wrap a raw value.
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  /// Access the raw value.
  pub fn expose(&self) -> &str {
    &self.0
  }

  /// Masked form suitable for logs and status output.
  pub fn masked(&self) -> String {
    mask(&self.0)
  }

  pub fn is_empty(&self) -> bool {
    self.0.trim().is_empty()
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Secret({})", self.masked())
  }
}

impl fmt::Display for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.masked())
  }
}

impl From<String> for Secret {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl From<&str> for Secret {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}
