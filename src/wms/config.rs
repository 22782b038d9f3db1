// SPDX-License-Identifier: MIT

//! Runtime settings read from the environment (`.env` is loaded by `main`).

use std::env;
use std::path::PathBuf;
use url::Url;

use crate::steps::error::{Result, WmsError};

pub const DEFAULT_GRAPHQL_URL: &str = "http://127.0.0.1:4000/graphql";
pub const DEFAULT_STORAGE_DIR: &str = ".wms-state";
pub const DEFAULT_TOKEN_COOKIE: &str = "token";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub graphql_url: Url,
    /// Directory of the file-backed workflow store
    pub storage_dir: PathBuf,
    pub routes_file: Option<PathBuf>,
    pub plans_file: Option<PathBuf>,
    /// Cookie holding the caller's bearer token
    pub token_cookie: String,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build settings from any variable source; empty values count as unset.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let graphql_url = var("WMS_GRAPHQL_URL").unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string());
        let graphql_url = Url::parse(&graphql_url)
            .map_err(|e| WmsError::config(format!("WMS_GRAPHQL_URL '{}': {}", graphql_url, e)))?;

        let port = match var("WMS_PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| WmsError::config(format!("WMS_PORT '{}' is not a port", port)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            graphql_url,
            storage_dir: var("WMS_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            routes_file: var("WMS_ROUTES_FILE").map(PathBuf::from),
            plans_file: var("WMS_PLANS_FILE").map(PathBuf::from),
            token_cookie: var("WMS_TOKEN_COOKIE").unwrap_or_else(|| DEFAULT_TOKEN_COOKIE.to_string()),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.graphql_url.as_str(), DEFAULT_GRAPHQL_URL);
        assert_eq!(settings.storage_dir, PathBuf::from(DEFAULT_STORAGE_DIR));
        assert_eq!(settings.token_cookie, "token");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(settings.routes_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("WMS_GRAPHQL_URL", "https://wms.example.com/graphql"),
            ("WMS_PORT", "8080"),
            ("WMS_ROUTES_FILE", "routes.yaml"),
            ("WMS_TOKEN_COOKIE", "session"),
            ("WMS_PLANS_FILE", ""),
        ])
        .unwrap();
        assert_eq!(settings.graphql_url.host_str(), Some("wms.example.com"));
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.routes_file, Some(PathBuf::from("routes.yaml")));
        assert_eq!(settings.token_cookie, "session");
        assert!(settings.plans_file.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("WMS_GRAPHQL_URL", "not a url")]),
            Err(WmsError::Config(_))
        ));
        assert!(matches!(
            settings(&[("WMS_PORT", "99999")]),
            Err(WmsError::Config(_))
        ));
    }
}
