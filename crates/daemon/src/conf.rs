// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for the small `KEY=VALUE` files used by node configs, job configs
//! and script environment files.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Parsed contents of one config or env file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfFile {
    values: HashMap<String, String>,
}

impl ConfFile {
    /// Parse a file. Blank lines and `#` comments are ignored. A line without
    /// `=` makes the whole file invalid; callers skip such files with a
    /// warning and load the rest of the configuration normally.
    pub fn parse(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed line: {line}"),
                )
            })?;
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Numeric value with a default when missing or unparseable.
    pub fn get_int<T: FromStr + Copy>(&self, key: &str, default: T) -> T {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Comma-separated tag list; empty set when the key is absent.
    pub fn get_tags(&self, key: &str) -> BTreeSet<String> {
        self.values
            .get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All key/value pairs, for env file merging.
    pub fn into_values(self) -> HashMap<String, String> {
        self.values
    }
}

#[cfg(test)]
#[path = "conf_tests.rs"]
mod tests;
