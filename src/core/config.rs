//! Service endpoints and credentials
//!
//! The credentials file is JSON with one section per server:
//!
//! ```json
//! {
//!     "ruteplan": {
//!         "pw": "yourpassword",
//!         "user": "yourUserName",
//!         "url": "https://www.vegvesen.no/ruteplan/routingservice_v1_0/routingservice/solve"
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use strsim::jaro_winkler;

use crate::core::error::{Error, Result};

/// Road database endpoint used by [`crate::core::client::NvdbClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the road database read API
    pub nvdb_base_url: String,

    /// Sent as `X-Client` on road database requests
    pub client_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nvdb_base_url: "https://nvdbapiles-v3.atlas.vegvesen.no".to_string(),
            client_name: format!("nvdb-mapper/{}", env!("NVDB_MAPPER_VERSION")),
        }
    }
}

/// Resolved credentials for one server section
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub url: String,
    /// `(user, password)` when both are present and non-empty
    pub auth: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    url: Option<String>,
    user: Option<String>,
    pw: Option<String>,
}

impl Credentials {
    /// Load the `server` section of a credentials file
    pub fn load(path: impl AsRef<Path>, server: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "can't read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text, server)
    }

    /// Parse the `server` section out of credentials JSON
    pub fn from_json(text: &str, server: &str) -> Result<Self> {
        let sections: BTreeMap<String, RawCredentials> = serde_json::from_str(text)?;

        let Some(section) = sections.get(server) else {
            let names: Vec<&str> = sections.keys().map(String::as_str).collect();
            let hint = match suggest_section(server, &names) {
                Some(s) => format!(" Did you mean '{s}'?"),
                None => String::new(),
            };
            return Err(Error::ConfigError(format!(
                "no section '{server}' in credentials file.{hint}"
            )));
        };

        let url = section
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::ConfigError(format!("section '{server}' in credentials file has no 'url'"))
            })?;

        let auth = match (&section.user, &section.pw) {
            (Some(user), Some(pw)) if !user.is_empty() && !pw.is_empty() => {
                Some((user.clone(), pw.clone()))
            }
            _ => None,
        };

        Ok(Self { url, auth })
    }
}

/// Closest section name to `name`, if any is reasonably close
fn suggest_section<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let name = name.to_lowercase();
    candidates
        .iter()
        .map(|c| (*c, jaro_winkler(&name, &c.to_lowercase())))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CREDENTIALS: &str = r#"{
        "ruteplan": { "pw": "secret", "user": "me", "url": "https://routing.example/solve" },
        "ruteplanTriona": { "pw": "", "user": "", "url": "https://triona.example/solve" }
    }"#;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CREDENTIALS.as_bytes()).unwrap();

        let creds = Credentials::load(file.path(), "ruteplan").unwrap();
        assert_eq!(creds.url, "https://routing.example/solve");
        assert_eq!(creds.auth, Some(("me".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_empty_user_means_no_auth() {
        let creds = Credentials::from_json(CREDENTIALS, "ruteplanTriona").unwrap();
        assert_eq!(creds.auth, None);
    }

    #[test]
    fn test_unknown_section_suggests_closest() {
        let err = Credentials::from_json(CREDENTIALS, "ruteplann").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("Did you mean 'ruteplan'?"));

        let err = Credentials::from_json(CREDENTIALS, "xyz").unwrap_err();
        assert!(!err.to_string().contains("Did you mean"));
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = Credentials::from_json(r#"{ "ruteplan": { "user": "me" } }"#, "ruteplan")
            .unwrap_err();
        assert!(err.to_string().contains("no 'url'"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(dir.path().join("credentials.json"), "ruteplan").unwrap_err();
        assert!(err.to_string().contains("can't read credentials file"));
    }
}
