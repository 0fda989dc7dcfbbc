//! Target reader age ranges

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Age range a story is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetAge {
    #[serde(rename = "2-5")]
    Toddler,
    #[default]
    #[serde(rename = "5-8")]
    EarlyReader,
    #[serde(rename = "6-10")]
    Independent,
}

impl TargetAge {
    pub const ALL: [TargetAge; 3] = [Self::Toddler, Self::EarlyReader, Self::Independent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toddler => "2-5",
            Self::EarlyReader => "5-8",
            Self::Independent => "6-10",
        }
    }
}

impl fmt::Display for TargetAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetAge {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|age| age.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|a| a.as_str()).collect();
                DomainError::validation(format!(
                    "Unknown target age '{}'. Valid ranges: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for age in TargetAge::ALL {
            assert_eq!(age.as_str().parse::<TargetAge>().unwrap(), age);
        }
        assert_eq!(TargetAge::default().to_string(), "5-8");
    }

    #[test]
    fn test_unknown_age_lists_valid_ranges() {
        let err = "3-4".parse::<TargetAge>().unwrap_err();
        assert!(err.to_string().contains("2-5, 5-8, 6-10"));
    }

    #[test]
    fn test_serializes_as_range_string() {
        let json = serde_json::to_string(&TargetAge::Independent).unwrap();
        assert_eq!(json, "\"6-10\"");
    }
}
