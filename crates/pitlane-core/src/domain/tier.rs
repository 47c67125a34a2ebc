//! Discipline and tier: the two coordinates a task is filed under.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ConfigError;

/// Racing discipline. Tasks, events and drivers are matched on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Gt,
    Formula,
    Rally,
    Karting,
    Historic,
    Offroad,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Discipline::Gt => "gt",
            Discipline::Formula => "formula",
            Discipline::Rally => "rally",
            Discipline::Karting => "karting",
            Discipline::Historic => "historic",
            Discipline::Offroad => "offroad",
        };
        f.write_str(s)
    }
}

/// Discrete difficulty rank. Events get one from the external classifier,
/// drivers hold one as their current standing.
///
/// Ordered: `E0 < E1 < ... < E5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tier {
    E0,
    E1,
    E2,
    E3,
    E4,
    E5,
}

impl Tier {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Tier::E0),
            1 => Some(Tier::E1),
            2 => Some(Tier::E2),
            3 => Some(Tier::E3),
            4 => Some(Tier::E4),
            5 => Some(Tier::E5),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.rank())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix(['E', 'e'])
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Tier::from_rank)
            .ok_or_else(|| ConfigError::InvalidTier(s.to_string()))
    }
}

impl TryFrom<String> for Tier {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("E0", Tier::E0)]
    #[case("E3", Tier::E3)]
    #[case(" e5 ", Tier::E5)]
    fn parses_tier_labels(#[case] label: &str, #[case] expected: Tier) {
        assert_eq!(label.parse::<Tier>().unwrap(), expected);
    }

    #[rstest]
    #[case("E6")]
    #[case("2")]
    #[case("")]
    fn rejects_unknown_tier_labels(#[case] label: &str) {
        assert!(matches!(label.parse::<Tier>(), Err(ConfigError::InvalidTier(_))));
    }

    #[test]
    fn tiers_are_ordered_by_rank() {
        assert!(Tier::E1 < Tier::E2);
        assert_eq!(Tier::E4.rank(), 4);
        assert_eq!(serde_json::to_string(&Tier::E2).unwrap(), "\"E2\"");
    }
}
