//! Shared enumerations and value normalization for Numista requests.

mod currency;

pub use currency::{is_iso4217, normalize_currency, ISO_4217_CODES};

use crate::errors::{NumistaError, NumistaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Response language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// English.
    #[default]
    En,
    /// French.
    Fr,
    /// Spanish.
    Es,
}

impl Lang {
    /// Gets the query value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
            Self::Es => "es",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = NumistaError;

    fn from_str(s: &str) -> NumistaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            "es" => Ok(Self::Es),
            other => Err(NumistaError::invalid_input(
                "lang",
                format!("Unsupported language '{}', expected one of en, fr, es", other),
            )
            .logged()),
        }
    }
}

/// Catalogue category filter. `None` in a request means unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Coins.
    Coin,
    /// Banknotes.
    Banknote,
    /// Exonumia (tokens, medals).
    Exonumia,
}

impl Category {
    /// Gets the query value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Banknote => "banknote",
            Self::Exonumia => "exonumia",
        }
    }

    /// Parses an optional category, treating an empty string as unrestricted.
    pub fn parse_optional(s: &str) -> NumistaResult<Option<Self>> {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = NumistaError;

    fn from_str(s: &str) -> NumistaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coin" => Ok(Self::Coin),
            "banknote" => Ok(Self::Banknote),
            "exonumia" => Ok(Self::Exonumia),
            other => Err(NumistaError::invalid_input(
                "category",
                format!(
                    "Unsupported category '{}', expected one of coin, banknote, exonumia",
                    other
                ),
            )
            .logged()),
        }
    }
}

/// Numista grading labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// Good.
    G,
    /// Very good.
    Vg,
    /// Fine.
    F,
    /// Very fine.
    Vf,
    /// Extremely fine.
    Xf,
    /// About uncirculated.
    Au,
    /// Uncirculated.
    Unc,
}

impl Grade {
    /// All grades, lowest first.
    pub const ALL: [Grade; 7] = [
        Grade::G,
        Grade::Vg,
        Grade::F,
        Grade::Vf,
        Grade::Xf,
        Grade::Au,
        Grade::Unc,
    ];

    /// Gets the API label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G => "g",
            Self::Vg => "vg",
            Self::F => "f",
            Self::Vf => "vf",
            Self::Xf => "xf",
            Self::Au => "au",
            Self::Unc => "unc",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = NumistaError;

    fn from_str(s: &str) -> NumistaResult<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == needle)
            .ok_or_else(|| {
                NumistaError::invalid_input("grade", format!("Unknown grade '{}'", s)).logged()
            })
    }
}

/// Validates a grade label, returning the normalized grade when known.
pub fn validate_grade(grade: &str) -> Option<Grade> {
    tracing::debug!(grade, "Validating grade");
    grade.parse().ok()
}
