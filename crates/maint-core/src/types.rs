use crate::error::MaintError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Brands
// ---------------------------------------------------------------------------

pub const BRAND_PHET: &str = "phet";
pub const BRAND_PHET_IO: &str = "phet-io";

// ---------------------------------------------------------------------------
// SimVersion
// ---------------------------------------------------------------------------

/// A deployed simulation version, `major.minor.maintenance[-testType.testNumber]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimVersion {
    pub major: u32,
    pub minor: u32,
    pub maintenance: u32,
    #[serde(default)]
    pub test_type: Option<String>,
    #[serde(default)]
    pub test_number: Option<u32>,
    #[serde(default)]
    pub build_timestamp: Option<String>,
}

impl SimVersion {
    pub fn new(major: u32, minor: u32, maintenance: u32) -> Self {
        Self {
            major,
            minor,
            maintenance,
            test_type: None,
            test_number: None,
            build_timestamp: None,
        }
    }

    pub fn release_candidate(major: u32, minor: u32, maintenance: u32, number: u32) -> Self {
        Self {
            test_type: Some("rc".to_string()),
            test_number: Some(number),
            ..Self::new(major, minor, maintenance)
        }
    }

    pub fn is_release_candidate(&self) -> bool {
        self.test_type.as_deref() == Some("rc")
    }
}

impl fmt::Display for SimVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.maintenance)?;
        if let Some(test_type) = &self.test_type {
            write!(f, "-{test_type}")?;
            if let Some(n) = self.test_number {
                write!(f, ".{n}")?;
            }
        }
        Ok(())
    }
}

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([A-Za-z]+)(?:\.(\d+))?)?$").unwrap()
    })
}

impl std::str::FromStr for SimVersion {
    type Err = MaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MaintError::InvalidVersion(s.to_string());
        let caps = version_re().captures(s.trim()).ok_or_else(invalid)?;
        let num = |i: usize| -> Result<u32, MaintError> {
            caps[i].parse::<u32>().map_err(|_| invalid())
        };
        let test_number = match caps.get(5) {
            Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };
        Ok(Self {
            major: num(1)?,
            minor: num(2)?,
            maintenance: num(3)?,
            test_type: caps.get(4).map(|m| m.as_str().to_string()),
            test_number,
            build_timestamp: None,
        })
    }
}
