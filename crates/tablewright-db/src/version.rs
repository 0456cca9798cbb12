use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

/// Identifier of the migration run, e.g. `9.2` or `plugin-1.4.0`.
///
/// Used in log file names and in the context of error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u32> for Version {
    fn from(v: u32) -> Self {
        Self(v.to_string())
    }
}

// Plan files often write versions as bare integers (`version: 84`). A bare
// decimal has already lost its text by the time it gets here (`0.90` arrives
// as 0.9), so it is refused and has to be quoted.
impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Ok(Self(v.to_string())),
            Raw::Text(s) => Ok(Self(s)),
            Raw::Float(v) => Err(de::Error::custom(format!(
                "version {v} must be quoted, e.g. version: \"{v}\", so trailing zeros are kept"
            ))),
        }
    }
}
