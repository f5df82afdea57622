//! Server configuration: listen address, CORS flag, auth header name and
//! TLS settings. Loadable from a YAML file or built programmatically.

use crate::tls::MinTlsVersion;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IPv4 address the listener binds to.
    pub listen_address: String,
    pub listen_port: u16,
    /// When enabled every response carries `Access-Control-Allow-Origin: *`
    /// and OPTIONS preflights are answered without routing.
    pub cors_enabled: bool,
    /// Header carrying the auth token; a query parameter of the same name
    /// is the fallback. Matched case-insensitively on the wire.
    pub auth_header: String,
    pub tls: Option<TlsSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 8080,
            cors_enabled: false,
            auth_header: "x-api-key".to_string(),
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    #[serde(default = "default_alpn")]
    pub alpn_protocols: Vec<String>,
    #[serde(default)]
    pub min_tls_version: MinTlsVersion,
}

fn default_alpn() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_address, "0.0.0.0");
        assert_eq!(cfg.listen_port, 8080);
        assert!(!cfg.cors_enabled);
        assert_eq!(cfg.auth_header, "x-api-key");
        assert!(cfg.tls.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let cfg: ServerConfig = serde_yaml::from_str(
            r#"
listen_address: 127.0.0.1
listen_port: 9000
cors_enabled: true
auth_header: x-search-api-key
tls:
  cert_path: /etc/certs/server.pem
  key_path: /etc/certs/server.key
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.listen_port, 9000);
        assert!(cfg.cors_enabled);
        assert_eq!(cfg.auth_header, "x-search-api-key");
        let tls = cfg.tls.expect("tls settings");
        assert_eq!(tls.alpn_protocols, vec!["h2", "http/1.1"]);
        assert_eq!(tls.min_tls_version, MinTlsVersion::Tls12);
    }
}
