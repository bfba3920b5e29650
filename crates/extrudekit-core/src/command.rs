//! G-code command lines

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single G-code line, sent verbatim followed by one `\n`.
///
/// Surrounding whitespace is trimmed on construction so the wire never
/// carries a doubled terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command(String);

impl Command {
    /// Create a command from its text
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(text.as_ref().trim().to_string())
    }

    /// The command text without terminator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The G/M word, e.g. `M105` for `M105` or `G1` for `G1 E5 F300`
    pub fn word(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
