//! Execution endpoint entries

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How an endpoint is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    #[default]
    Http,
    Https,
    /// In-process simulated endpoint. Its runs exist only inside the
    /// process that started them, so it cannot be polled from another one.
    Mock,
}

impl Proto {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proto::Http => "http",
            Proto::Https => "https",
            Proto::Mock => "mock",
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single endpoint entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Unique identifier (queue document key)
    pub id: String,

    /// Host and optional port, e.g. `wes.example.org:8080`
    #[serde(default)]
    pub host: String,

    /// Scheme (default: http)
    #[serde(default)]
    pub proto: Proto,

    /// Authorization header value sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl EndpointConfig {
    pub fn new(id: impl Into<String>, host: impl Into<String>, proto: Proto) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            proto,
            auth: None,
        }
    }

    /// Simulated endpoint with no host
    pub fn mock(id: impl Into<String>) -> Self {
        Self::new(id, String::new(), Proto::Mock)
    }

    /// WES API base URL, e.g. `https://wes.example.org/ga4gh/wes/v1`
    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.proto, self.host, wes_protocol::API_BASE_PATH)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingField {
                kind: "Endpoint",
                name: "(unnamed)".to_string(),
                field: "id",
            });
        }

        if !self.id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.') {
            return Err(ConfigError::InvalidValue {
                kind: "Endpoint",
                name: self.id.clone(),
                field: "id",
                reason: "id must contain only alphanumeric characters, dots, dashes, and underscores"
                    .to_string(),
            });
        }

        if self.host.is_empty() && self.proto != Proto::Mock {
            return Err(ConfigError::MissingField {
                kind: "Endpoint",
                name: self.id.clone(),
                field: "host",
            });
        }

        if self.host.contains("://") {
            return Err(ConfigError::InvalidValue {
                kind: "Endpoint",
                name: self.id.clone(),
                field: "host",
                reason: "host must not include a scheme; use 'proto'".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let endpoint = EndpointConfig::new("cloud", "wes.example.org:8443", Proto::Https);
        assert_eq!(endpoint.base_url(), "https://wes.example.org:8443/ga4gh/wes/v1");
    }

    #[test]
    fn test_mock_endpoint_needs_no_host() {
        assert!(EndpointConfig::mock("sim").validate().is_ok());
        assert!(matches!(
            EndpointConfig::new("local", "", Proto::Http).validate(),
            Err(ConfigError::MissingField { field: "host", .. })
        ));
    }

    #[test]
    fn test_host_with_scheme_rejected() {
        let endpoint = EndpointConfig::new("local", "http://localhost", Proto::Http);
        assert!(matches!(
            endpoint.validate(),
            Err(ConfigError::InvalidValue { field: "host", .. })
        ));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let endpoint = EndpointConfig::new("bad id", "localhost", Proto::Http);
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_unknown_proto_fails_to_parse() {
        let result: Result<EndpointConfig, _> = toml::from_str(
            r#"
            id = "x"
            host = "h"
            proto = "ftp"
        "#,
        );
        assert!(result.is_err());
    }
}
