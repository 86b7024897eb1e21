//! Sender configuration, configured defaults and per-call overrides.

use crate::attachment::{Attachment, Attachments};
use crate::error::Result;
use crate::error_report::ErrorReport;
use crate::image::BodyImage;
use crate::table::BodyTable;
use mailforge_smtp::{Security, SmtpConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Values used when a call leaves a field out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// `From` address.
    pub sender: Option<String>,
    /// `To` addresses.
    pub receivers: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Extra headers; a call's headers win on name clashes.
    pub headers: BTreeMap<String, String>,
    /// Inline text body.
    pub text: Option<String>,
    /// Inline HTML body.
    pub html: Option<String>,
    /// Named text template.
    pub text_template: Option<String>,
    /// Named HTML template.
    pub html_template: Option<String>,
}

/// Header and body fields after defaults have been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Subject line.
    pub subject: Option<String>,
    /// `From` address.
    pub sender: Option<String>,
    /// `To` addresses.
    pub receivers: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses.
    pub bcc: Vec<String>,
    /// Extra headers in order.
    pub headers: Vec<(String, String)>,
    /// Inline text body.
    pub text: Option<String>,
    /// Named text template.
    pub text_template: Option<String>,
    /// Inline HTML body.
    pub html: Option<String>,
    /// Named HTML template.
    pub html_template: Option<String>,
}

fn present(value: Option<&String>) -> Option<&String> {
    value.filter(|value| !value.is_empty())
}

fn first_present(explicit: Option<&String>, fallback: Option<&String>) -> Option<String> {
    present(explicit).or_else(|| present(fallback)).cloned()
}

fn first_nonempty(explicit: &[String], fallback: &[String]) -> Vec<String> {
    if explicit.is_empty() {
        fallback.to_vec()
    } else {
        explicit.to_vec()
    }
}

impl Defaults {
    /// Merges a call's fields over these defaults.
    ///
    /// Empty strings and lists count as absent. The sender falls back to
    /// `username`. A channel's body and template are taken together, so a
    /// call that sets either one replaces both defaults of that channel.
    #[must_use]
    pub fn resolve(&self, compose: &Compose, username: Option<&str>) -> Resolved {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                !compose
                    .headers
                    .iter()
                    .any(|(explicit, _)| explicit.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.extend(compose.headers.iter().cloned());

        let (text, text_template) = if present(compose.text.as_ref()).is_some()
            || present(compose.text_template.as_ref()).is_some()
        {
            (compose.text.as_ref(), compose.text_template.as_ref())
        } else {
            (self.text.as_ref(), self.text_template.as_ref())
        };
        let (html, html_template) = if present(compose.html.as_ref()).is_some()
            || present(compose.html_template.as_ref()).is_some()
        {
            (compose.html.as_ref(), compose.html_template.as_ref())
        } else {
            (self.html.as_ref(), self.html_template.as_ref())
        };

        Resolved {
            subject: first_present(compose.subject.as_ref(), self.subject.as_ref()),
            sender: first_present(compose.sender.as_ref(), self.sender.as_ref())
                .or_else(|| username.filter(|name| !name.is_empty()).map(str::to_string)),
            receivers: first_nonempty(&compose.receivers, &self.receivers),
            cc: first_nonempty(&compose.cc, &self.cc),
            bcc: first_nonempty(&compose.bcc, &self.bcc),
            headers,
            text: present(text).cloned(),
            text_template: present(text_template).cloned(),
            html: present(html).cloned(),
            html_template: present(html_template).cloned(),
        }
    }
}

/// Everything one email is built from; unset fields fall back to [`Defaults`].
#[derive(Debug, Clone, Default)]
pub struct Compose {
    /// Subject line.
    pub subject: Option<String>,
    /// `From` address.
    pub sender: Option<String>,
    /// `To` addresses.
    pub receivers: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses; they receive the mail but never see the header.
    pub bcc: Vec<String>,
    /// Extra headers, replacing generated ones of the same name.
    pub headers: Vec<(String, String)>,
    /// Inline text body (a template source unless templating is off).
    pub text: Option<String>,
    /// Inline HTML body.
    pub html: Option<String>,
    /// Named text template.
    pub text_template: Option<String>,
    /// Named HTML template.
    pub html_template: Option<String>,
    /// Inline images by template variable name.
    pub images: Vec<(String, BodyImage)>,
    /// Tables by template variable name.
    pub tables: Vec<(String, BodyTable)>,
    /// Extra template parameters.
    pub params: Map<String, Value>,
    /// Attachments.
    pub attachments: Attachments,
    /// Overrides [`SenderConfig::use_templating`] for this call.
    pub use_templating: Option<bool>,
    /// Error shown through the `error` template parameter.
    pub error: Option<ErrorReport>,
}

impl Compose {
    /// Empty composition; everything comes from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Adds a `To` address.
    #[must_use]
    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receivers.push(receiver.into());
        self
    }

    /// Adds several `To` addresses.
    #[must_use]
    pub fn receivers<I, S>(mut self, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receivers.extend(receivers.into_iter().map(Into::into));
        self
    }

    /// Adds a `Cc` address.
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Adds a `Bcc` address.
    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the inline text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the inline HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Renders the text body from a named template.
    #[must_use]
    pub fn text_template(mut self, name: impl Into<String>) -> Self {
        self.text_template = Some(name.into());
        self
    }

    /// Renders the HTML body from a named template.
    #[must_use]
    pub fn html_template(mut self, name: impl Into<String>) -> Self {
        self.html_template = Some(name.into());
        self
    }

    /// Embeds an image, available as `{{ name }}` in the HTML body.
    #[must_use]
    pub fn image(mut self, name: impl Into<String>, image: impl Into<BodyImage>) -> Self {
        self.images.push((name.into(), image.into()));
        self
    }

    /// Embeds a table, available as `{{ name }}` in both bodies.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, table: impl Into<BodyTable>) -> Self {
        self.tables.push((name.into(), table.into()));
        self
    }

    /// Adds a template parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attaches content under a filename.
    #[must_use]
    pub fn attachment(mut self, filename: impl Into<String>, content: impl Into<Attachment>) -> Self {
        self.attachments.add_named(filename, content);
        self
    }

    /// Attaches a file under its own name.
    #[must_use]
    pub fn attach_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.add_file(path.into());
        self
    }

    /// Turns templating on or off for this call.
    #[must_use]
    pub const fn use_templating(mut self, enabled: bool) -> Self {
        self.use_templating = Some(enabled);
        self
    }

    /// Sets the error shown in the bodies.
    #[must_use]
    pub fn error(mut self, report: ErrorReport) -> Self {
        self.error = Some(report);
        self
    }
}

fn default_html_theme() -> Option<String> {
    Some("modest".to_string())
}

fn default_text_theme() -> Option<String> {
    Some("pandas".to_string())
}

/// Sender configuration: transport settings, rendering options and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Login user name; also the fallback sender.
    pub username: Option<String>,
    /// Login password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Security mode.
    pub security: Security,
    /// Connection timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Domain of generated Message-IDs and Content-IDs.
    ///
    /// When unset, the host name reported by the OS is used as is. That is
    /// often the short name rather than the FQDN; set this to get
    /// fully qualified ids.
    pub domain: Option<String>,
    /// Whether bodies are rendered as templates.
    pub use_templating: bool,
    /// Theme for tables in HTML bodies; `None` uses plain HTML.
    pub html_theme: Option<String>,
    /// Theme for tables in text bodies; `None` uses plain text.
    pub text_theme: Option<String>,
    /// Charset label for text attachments.
    pub attachment_encoding: String,
    /// Values used when a call leaves a field out.
    pub defaults: Defaults,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: Security::default().default_port(),
            username: None,
            password: None,
            security: Security::default(),
            timeout_secs: None,
            domain: None,
            use_templating: true,
            html_theme: default_html_theme(),
            text_theme: default_text_theme(),
            attachment_encoding: "UTF-8".to_string(),
            defaults: Defaults::default(),
        }
    }
}

impl SenderConfig {
    /// Creates a configuration for the given server.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>, port: u16) -> SenderConfigBuilder {
        SenderConfigBuilder::new(host, port)
    }

    /// Loads a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Transport settings.
    #[must_use]
    pub fn smtp_config(&self) -> SmtpConfig {
        let mut config = SmtpConfig::new(self.host.clone(), self.port);
        config.security = self.security;
        config.username.clone_from(&self.username);
        config.password.clone_from(&self.password);
        config.timeout = self.timeout_secs.map(Duration::from_secs);
        config.hello_name.clone_from(&self.domain);
        config
    }

    /// Applies the configured defaults to a call.
    #[must_use]
    pub fn resolve(&self, compose: &Compose) -> Resolved {
        self.defaults.resolve(compose, self.username.as_deref())
    }

    /// Whether a call renders its bodies as templates.
    #[must_use]
    pub fn templating_for(&self, compose: &Compose) -> bool {
        compose.use_templating.unwrap_or(self.use_templating)
    }

    /// Domain for generated ids: the configured domain, else the OS host
    /// name (not resolved to an FQDN), else `localhost`.
    #[must_use]
    pub fn id_domain(&self) -> String {
        self.domain
            .clone()
            .filter(|domain| !domain.is_empty())
            .or_else(|| {
                hostname::get()
                    .ok()
                    .map(|name| name.to_string_lossy().into_owned())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Builder for sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfigBuilder {
    config: SenderConfig,
}

impl SenderConfigBuilder {
    /// Creates a builder for the given server.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            config: SenderConfig::new(host, port),
        }
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Sets the domain of generated ids.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = Some(domain.into());
        self
    }

    /// Turns templating on or off.
    #[must_use]
    pub const fn use_templating(mut self, enabled: bool) -> Self {
        self.config.use_templating = enabled;
        self
    }

    /// Sets the HTML table theme.
    #[must_use]
    pub fn html_theme(mut self, theme: Option<&str>) -> Self {
        self.config.html_theme = theme.map(str::to_string);
        self
    }

    /// Sets the text table theme.
    #[must_use]
    pub fn text_theme(mut self, theme: Option<&str>) -> Self {
        self.config.text_theme = theme.map(str::to_string);
        self
    }

    /// Sets the default sender.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.config.defaults.sender = Some(sender.into());
        self
    }

    /// Sets the default receivers.
    #[must_use]
    pub fn receivers<I, S>(mut self, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.defaults.receivers = receivers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.config.defaults.subject = Some(subject.into());
        self
    }

    /// Replaces all defaults.
    #[must_use]
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SenderConfig {
        self.config
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
    fn test_config_defaults() {
        let config = SenderConfig::new("smtp.example.com", 587);
        assert!(config.use_templating);
        assert_eq!(config.html_theme.as_deref(), Some("modest"));
        assert_eq!(config.text_theme.as_deref(), Some("pandas"));
        assert_eq!(config.attachment_encoding, "UTF-8");
        assert_eq!(config.security, Security::StartTls);
    }

    #[test]
    fn test_from_json_partial() {
        let config = SenderConfig::from_json(
            r#"{
                "host": "smtp.example.com",
                "port": 465,
                "security": "tls",
                "username": "me@example.com",
                "html_theme": null,
                "defaults": {"subject": "Report", "receivers": ["ops@example.com"]}
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 465);
        assert_eq!(config.security, Security::Tls);
        assert!(config.html_theme.is_none());
        assert_eq!(config.text_theme.as_deref(), Some("pandas"));
        assert_eq!(config.defaults.subject.as_deref(), Some("Report"));

        assert!(SenderConfig::from_json("{\"port\": \"x\"}").is_err());
    }

    #[test]
    fn test_smtp_config() {
        let config = SenderConfig::builder("smtp.example.com", 2525)
            .security(Security::None)
            .credentials("user", "secret")
            .timeout(Duration::from_secs(5))
            .build();
        let smtp = config.smtp_config();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.security, Security::None);
        assert_eq!(smtp.credentials(), Some(("user", "secret")));
        assert_eq!(smtp.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        let config = SenderConfig::builder("localhost", 25)
            .sender("default@example.com")
            .receivers(["team@example.com"])
            .subject("Default subject")
            .build();

        let resolved = config.resolve(&Compose::new().subject("Explicit").receiver("me@example.com"));
        assert_eq!(resolved.subject.as_deref(), Some("Explicit"));
        assert_eq!(resolved.sender.as_deref(), Some("default@example.com"));
        assert_eq!(resolved.receivers, vec!["me@example.com"]);

        let resolved = config.resolve(&Compose::new().subject(""));
        assert_eq!(resolved.subject.as_deref(), Some("Default subject"));
        assert_eq!(resolved.receivers, vec!["team@example.com"]);
    }

    #[test]
    fn test_resolve_sender_falls_back_to_username() {
        let config = SenderConfig::builder("localhost", 25)
            .credentials("robot@example.com", "pw")
            .build();
        let resolved = config.resolve(&Compose::new());
        assert_eq!(resolved.sender.as_deref(), Some("robot@example.com"));
        assert!(resolved.subject.is_none());
    }

    #[test]
    fn test_resolve_channel_pairs() {
        let defaults = Defaults {
            html_template: Some("report.html".to_string()),
            text: Some("default text".to_string()),
            ..Defaults::default()
        };
        let resolved = defaults.resolve(&Compose::new().html("<p>explicit</p>"), None);
        assert_eq!(resolved.html.as_deref(), Some("<p>explicit</p>"));
        assert!(resolved.html_template.is_none());
        assert_eq!(resolved.text.as_deref(), Some("default text"));
    }

    #[test]
    fn test_resolve_headers() {
        let mut defaults = Defaults::default();
        defaults.headers.insert("X-Team".to_string(), "ops".to_string());
        defaults.headers.insert("X-Priority".to_string(), "3".to_string());

        let resolved = defaults.resolve(&Compose::new().header("x-priority", "1"), None);
        assert_eq!(
            resolved.headers,
            vec![
                ("X-Team".to_string(), "ops".to_string()),
                ("x-priority".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_id_domain() {
        let config = SenderConfig::builder("localhost", 25).domain("mail.example.com").build();
        assert_eq!(config.id_domain(), "mail.example.com");

        let config = SenderConfig::builder("localhost", 25).domain("").build();
        assert!(!config.id_domain().is_empty());
        assert!(!SenderConfig::default().id_domain().is_empty());
    }

    #[test]
    fn test_templating_override() {
        let config = SenderConfig::default();
        assert!(config.templating_for(&Compose::new()));
        assert!(!config.templating_for(&Compose::new().use_templating(false)));
    }
}
