//! Runtime settings read from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `JSONCSV_PORT` | `3000` |
//! | `JSONCSV_MAX_UPLOAD_BYTES` | `10485760` |
//! | `JSONCSV_PREVIEW_DEFAULT` | `5` |
//!
//! A `.env` file in the working directory is loaded first, when present.

use serde::Serialize;
use std::env;
use std::str::FromStr;

use crate::api::logs::log_warning;
use crate::parser::DEFAULT_MAX_UPLOAD_BYTES;
use crate::pipeline::{DEFAULT_PREVIEW_LIMIT, MAX_PREVIEW_LIMIT};

pub const DEFAULT_PORT: u16 = 3000;

/// Server and pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub preview_default: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            preview_default: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl Settings {
    /// Settings from environment variables, after loading `.env`.
    ///
    /// Unparseable values are reported and replaced by their default.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let preview_default = read(&lookup, "JSONCSV_PREVIEW_DEFAULT", defaults.preview_default);
        let preview_default = if (1..=MAX_PREVIEW_LIMIT).contains(&preview_default) {
            preview_default
        } else {
            log_warning(format!(
                "JSONCSV_PREVIEW_DEFAULT must be between 1 and {}, using {}",
                MAX_PREVIEW_LIMIT, defaults.preview_default
            ));
            defaults.preview_default
        };

        Self {
            port: read(&lookup, "JSONCSV_PORT", defaults.port),
            max_upload_bytes: read(&lookup, "JSONCSV_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            preview_default,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn read<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log_warning(format!("Ignoring invalid {}={:?}, using {}", key, raw, default));
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());
        assert_eq!(Settings::default().max_upload_bytes, 10_485_760);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("JSONCSV_PORT", "8080"),
            ("JSONCSV_MAX_UPLOAD_BYTES", "2048"),
            ("JSONCSV_PREVIEW_DEFAULT", "10"),
        ]));
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_upload_bytes, 2048);
        assert_eq!(settings.preview_default, 10);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("JSONCSV_PORT", "not-a-port"),
            ("JSONCSV_PREVIEW_DEFAULT", "99"),
        ]));
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.preview_default, DEFAULT_PREVIEW_LIMIT);
    }
}
