//! SMTP connection configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (port 25). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Tls,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// SMTP server configuration.
///
/// Authentication happens only when both username and password are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login user name.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Connection and command timeout; `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Name announced in EHLO; `None` uses the local host name.
    pub hello_name: Option<String>,
}

impl SmtpConfig {
    /// Creates a new configuration using STARTTLS on the given port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: Security::StartTls,
            username: None,
            password: None,
            timeout: None,
            hello_name: None,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SmtpConfigBuilder {
        SmtpConfigBuilder::new(host)
    }

    /// Returns the login pair when both parts are present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Builder for SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
    hello_name: Option<String>,
}

impl SmtpConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::StartTls,
            username: None,
            password: None,
            timeout: None,
            hello_name: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the EHLO name.
    #[must_use]
    pub fn hello_name(mut self, name: impl Into<String>) -> Self {
        self.hello_name = Some(name.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SmtpConfig {
        SmtpConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            username: self.username,
            password: self.password,
            timeout: self.timeout,
            hello_name: self.hello_name,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Tls.default_port(), 465);
    }

    #[test]
    fn test_config_builder() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::Tls)
            .credentials("me@example.com", "secret")
            .timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.port, 465);
        assert_eq!(config.credentials(), Some(("me@example.com", "secret")));
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let mut config = SmtpConfig::new("localhost", 2525);
        config.username = Some("me".to_string());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_security_serde_names() {
        let parsed: Security = serde_json::from_str("\"starttls\"").unwrap();
        assert_eq!(parsed, Security::StartTls);
        assert_eq!(serde_json::to_string(&Security::Tls).unwrap(), "\"tls\"");
    }
}
