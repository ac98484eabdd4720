// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::{SourceError, SourceResult};
use std::fmt;
use std::path::PathBuf;

const NETWORK_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Where a packed video comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    File(PathBuf),
    Network(String),
}

impl MediaLocation {
    /// Classify a user-supplied path or URL
    ///
    /// Local files must exist; URLs are handed to the decoder unchecked.
    pub fn parse(location: &str) -> SourceResult<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(SourceError::InvalidLocation("empty location".into()));
        }

        let lower = location.to_ascii_lowercase();
        if NETWORK_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
            return Ok(MediaLocation::Network(location.to_string()));
        }

        let path = PathBuf::from(location.strip_prefix("file://").unwrap_or(location));
        if !path.is_file() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        Ok(MediaLocation::File(path))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, MediaLocation::Network(_))
    }
}

impl fmt::Display for MediaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaLocation::File(path) => write!(f, "{}", path.display()),
            MediaLocation::Network(url) => write!(f, "{}", url),
        }
    }
}
