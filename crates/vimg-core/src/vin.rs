//! Vehicle Identification Number

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in a VIN
pub const VIN_LENGTH: usize = 17;

/// A validated 17-character VIN (`[A-HJ-NPR-Z0-9]{17}`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);

/// Reasons a string is not a VIN
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VinError {
    #[error("VIN must be {VIN_LENGTH} characters, got {0}")]
    Length(usize),

    #[error("VIN contains invalid character '{0}'")]
    InvalidCharacter(char),
}

impl Vin {
    /// Validate and wrap a VIN. No case folding: lower-case input is rejected.
    pub fn parse(value: &str) -> Result<Self, VinError> {
        let len = value.chars().count();
        if len != VIN_LENGTH {
            return Err(VinError::Length(len));
        }
        if let Some(c) = value.chars().find(|c| !is_vin_char(*c)) {
            return Err(VinError::InvalidCharacter(c));
        }
        Ok(Self(value.to_string()))
    }

    /// Check a string against the VIN pattern without allocating
    pub fn is_valid(value: &str) -> bool {
        value.len() == VIN_LENGTH && value.chars().all(is_vin_char)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe form: `***` followed by the last four characters
    pub fn masked(&self) -> String {
        format!("***{}", &self.0[VIN_LENGTH - 4..])
    }
}

fn is_vin_char(c: char) -> bool {
    c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Vin {
    type Err = VinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Vin {
    type Error = VinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Vin> for String {
    fn from(vin: Vin) -> Self {
        vin.0
    }
}

impl AsRef<str> for Vin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_vin() {
        let vin = Vin::parse("WVWZZZ1JZXW000001").unwrap();
        assert_eq!(vin.as_str(), "WVWZZZ1JZXW000001");
        assert!(Vin::is_valid("WVWZZZ1JZXW000001"));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(Vin::parse("too short"), Err(VinError::Length(9)));
        assert_eq!(
            Vin::parse("WVWZZZ1JZXW0000012"),
            Err(VinError::Length(18))
        );
        assert!(!Vin::is_valid(""));
    }

    #[test]
    fn test_rejects_excluded_letters() {
        for bad in ["WVWZZZ1JZXW00000O", "WVWZZZ1JZXW00000I", "WVWZZZ1JZXW00000Q"] {
            assert!(matches!(
                Vin::parse(bad),
                Err(VinError::InvalidCharacter(_))
            ));
            assert!(!Vin::is_valid(bad));
        }
    }

    #[test]
    fn test_rejects_lowercase() {
        assert_eq!(
            Vin::parse("wvwzzz1jzxw000001"),
            Err(VinError::InvalidCharacter('w'))
        );
    }

    #[test]
    fn test_masked_keeps_last_four() {
        let vin = Vin::parse("WVWZZZ1JZXW004321").unwrap();
        assert_eq!(vin.masked(), "***4321");
    }

    #[test]
    fn test_serde_validates() {
        let vin: Vin = serde_json::from_str("\"WVWZZZ1JZXW000001\"").unwrap();
        assert_eq!(vin.to_string(), "WVWZZZ1JZXW000001");
        assert!(serde_json::from_str::<Vin>("\"WVWZZZ1JZXW00000O\"").is_err());
    }
}
