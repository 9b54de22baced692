//! BSN — the Dutch citizen service number.
//!
//! A BSN is a 9-digit string whose last digit is a checksum over the first
//! eight (the "elfproef" variant used by the BRP). Everything downstream of
//! [`Bsn::parse`] treats the value as an opaque validated string.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Validate the BSN checksum.
///
/// Returns `false` for any string that is not exactly 9 ASCII digits, or
/// whose weighted digit sum over positions 0..8 (weights 9 down to 2)
/// modulo 11 does not equal the final digit. Never panics.
pub fn is_valid_bsn(value: &str) -> bool {
  let bytes = value.as_bytes();
  if bytes.len() != 9 || !bytes.iter().all(u8::is_ascii_digit) {
    return false;
  }

  let digit = |i: usize| u32::from(bytes[i] - b'0');
  let total: u32 = (0..8).map(|i| digit(i) * (9 - i as u32)).sum();

  total % 11 == digit(8)
}

/// A checksum-validated BSN.
///
/// Construction goes through [`Bsn::parse`]; an existing `Bsn` is therefore
/// always syntactically valid and can be stored or compared directly.
/// Deserialization funnels through the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Bsn(String);

impl TryFrom<String> for Bsn {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl Bsn {
  /// Parse and checksum-validate `value`.
  pub fn parse(value: &str) -> Result<Self> {
    if is_valid_bsn(value) {
      Ok(Self(value.to_owned()))
    } else {
      Err(Error::InvalidBsn(value.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Bsn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for Bsn {
  fn as_ref(&self) -> &str { &self.0 }
}
