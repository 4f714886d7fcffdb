//! Phone numbers normalized to E.164.
//!
//! Customers type local Thai numbers (`081 234 5678`); the identity provider
//! needs E.164 (`+66812345678`). Numbers without a country code are assumed
//! to be Thai.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Country calling code applied to numbers entered without one.
pub const DEFAULT_COUNTRY_CODE: &str = "66";

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// Nothing was entered.
    #[error("phone number cannot be empty")]
    Empty,
    /// A character other than digits or common separators was entered.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The normalized number is too short or too long for E.164.
    #[error("phone number must have 8 to 15 digits (got {0})")]
    InvalidLength(usize),
}

/// A phone number in E.164 form (`+` followed by 8-15 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 8;
    const MAX_DIGITS: usize = 15;

    /// Parse and normalize user input.
    ///
    /// Spaces, dashes, dots and parentheses are ignored. A leading `0` is
    /// replaced by the default country code, a number without `+` gets the
    /// default country code prepended, and a `+` number is kept as is.
    ///
    /// ```
    /// use mommypump_core::PhoneNumber;
    ///
    /// assert_eq!(PhoneNumber::parse("081-234-5678").unwrap().as_str(), "+66812345678");
    /// assert_eq!(PhoneNumber::parse("812345678").unwrap().as_str(), "+66812345678");
    /// assert_eq!(PhoneNumber::parse("+1 (415) 555-0100").unwrap().as_str(), "+14155550100");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters or other
    /// symbols, or does not normalize to 8-15 digits.
    pub fn parse(input: &str) -> Result<Self, PhoneNumberError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        let (international, rest) = trimmed
            .strip_prefix('+')
            .map_or((false, trimmed), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len());
        for ch in rest.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneNumberError::InvalidCharacter(other)),
            }
        }

        let national = if international {
            digits
        } else if let Some(local) = digits.strip_prefix('0') {
            format!("{DEFAULT_COUNTRY_CODE}{local}")
        } else {
            format!("{DEFAULT_COUNTRY_CODE}{digits}")
        };

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&national.len()) {
            return Err(PhoneNumberError::InvalidLength(national.len()));
        }

        Ok(Self(format!("+{national}")))
    }

    /// Returns the E.164 representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
