use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoverError;

static FILE_NAME_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{2,5})-(\d{2,5})").expect("identifier pattern is valid")
});

static EXACT_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{2,5})-(\d{2,5})$").expect("identifier pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let captures = FILE_NAME_IDENTIFIER.captures(file_name)?;
        Some(Self::from_parts(&captures[1], &captures[2]))
    }

    fn from_parts(letters: &str, digits: &str) -> Self {
        Self(format!("{}-{}", letters.to_ascii_uppercase(), digits))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = CoverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = EXACT_IDENTIFIER
            .captures(value.trim())
            .ok_or_else(|| CoverError::InvalidIdentifier(value.to_string()))?;
        Ok(Self::from_parts(&captures[1], &captures[2]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub identifier: Identifier,
    pub target_dir: PathBuf,
}

impl WorkItem {
    pub fn new(identifier: Identifier, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            identifier,
            target_dir: target_dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverPage {
    pub artwork_url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverOutcome {
    pub identifier: Identifier,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl CoverOutcome {
    pub fn success(identifier: Identifier) -> Self {
        Self {
            identifier,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(identifier: Identifier, error: impl Into<String>) -> Self {
        Self {
            identifier,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}
