//! `tracing` layers that send log events by email.
//!
//! [`EmailLayer`] sends one message per event; [`BufferedEmailLayer`]
//! collects events and sends them together. Both are configured through a
//! validated [`HandlerConfig`].
//!
//! ```no_run
//! use mailforge::log::{EmailLayer, HandlerConfig};
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::util::SubscriberInitExt;
//!
//! let config = HandlerConfig::builder("smtp.example.com", 587)
//!     .credentials("alerts@example.com", "secret")
//!     .receivers(["oncall@example.com"])
//!     .subject("{level} in {target}")
//!     .level(tracing::Level::ERROR)
//!     .build()
//!     .unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(EmailLayer::new(config))
//!     .init();
//! ```

use crate::capability::Capabilities;
use crate::config::{Compose, SenderConfig};
use crate::error::{Error, Result};
use crate::error_report::ErrorReport;
use crate::sender::EmailSender;
use chrono::{DateTime, Local};
use mailforge_smtp::{Security, Transport};
use serde::Serialize;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const DEFAULT_SUBJECT: &str = "Log record";
const RECORD_TEXT: &str = "{{ msg }}";
const RECORDS_TEXT: &str = "{% for record in records -%}\n{{ record.timestamp }} {{ record.level }} {{ record.target }}: {{ record.message }}\n{% endfor %}";

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as sending, so events raised while sending are
/// not fed back into the layers.
struct EmitGuard;

impl EmitGuard {
    fn enter() -> Option<Self> {
        if EMITTING.with(Cell::get) {
            return None;
        }
        EMITTING.with(|flag| flag.set(true));
        Some(Self)
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        EMITTING.with(|flag| flag.set(false));
    }
}

/// A captured `tracing` event, available to templates as `record`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Level name (`ERROR`, `WARN`, ...).
    pub level: String,
    /// Event target, usually the module path.
    pub target: String,
    /// The event message.
    pub message: String,
    /// Other recorded fields.
    pub fields: BTreeMap<String, String>,
    /// When the event was captured.
    pub timestamp: DateTime<Local>,
    /// Module that emitted the event.
    pub module_path: Option<String>,
    /// Source file.
    pub file: Option<String>,
    /// Source line.
    pub line: Option<u32>,
    #[serde(skip)]
    severity: Level,
}

impl LogRecord {
    /// Captures an event.
    #[must_use]
    pub fn from_event(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        Self {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
            timestamp: Local::now(),
            module_path: metadata.module_path().map(str::to_string),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            severity: *metadata.level(),
        }
    }

    /// Event level.
    #[must_use]
    pub const fn severity(&self) -> Level {
        self.severity
    }

    /// Message followed by `key=value` pairs of the other fields.
    #[must_use]
    pub fn formatted(&self) -> String {
        let mut formatted = self.message.clone();
        for (key, value) in &self.fields {
            let _ = write!(formatted, " {key}={value}");
        }
        formatted
    }

    fn error_report(&self) -> Option<ErrorReport> {
        self.fields
            .get("error")
            .map(|error| ErrorReport::new("Error", error.as_str()))
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

/// Validated handler settings shared by both layers.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    sender: EmailSender,
    level: Level,
}

impl HandlerConfig {
    /// Creates a builder for an SMTP server.
    #[must_use]
    pub fn builder(host: impl Into<String>, port: u16) -> HandlerConfigBuilder {
        HandlerConfigBuilder::new(host, port)
    }

    /// Wraps an existing sender.
    ///
    /// Without configured receivers the login user receives the mail; the
    /// subject defaults to `"Log record"`.
    ///
    /// # Errors
    ///
    /// Returns `MissingReceiver` if there is neither a receiver nor a username.
    pub fn from_sender(mut sender: EmailSender, level: Level) -> Result<Self> {
        let config = sender.config_mut();
        if config.defaults.receivers.is_empty() {
            let username = config
                .username
                .clone()
                .filter(|name| !name.is_empty())
                .ok_or(Error::MissingReceiver)?;
            config.defaults.receivers = vec![username];
        }
        if config.defaults.subject.as_deref().is_none_or(str::is_empty) {
            config.defaults.subject = Some(DEFAULT_SUBJECT.to_string());
        }
        Ok(Self { sender, level })
    }

    /// The sender used for log mail.
    #[must_use]
    pub const fn sender(&self) -> &EmailSender {
        &self.sender
    }

    /// Least severe level that is mailed.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    fn into_sender(mut self, default_text: &str) -> (EmailSender, Level) {
        let defaults = &mut self.sender.config_mut().defaults;
        if defaults.text.is_none()
            && defaults.html.is_none()
            && defaults.text_template.is_none()
            && defaults.html_template.is_none()
        {
            defaults.text = Some(default_text.to_string());
        }
        (self.sender, self.level)
    }
}

/// Builder for [`HandlerConfig`].
pub struct HandlerConfigBuilder {
    config: SenderConfig,
    level: Level,
    transport: Option<Arc<dyn Transport>>,
    capabilities: Capabilities,
}

impl fmt::Debug for HandlerConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfigBuilder")
            .field("config", &self.config)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl HandlerConfigBuilder {
    /// Creates a builder; events at `WARN` or above are mailed by default.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            config: SenderConfig::new(host, port),
            level: Level::WARN,
            transport: None,
            capabilities: Capabilities::none(),
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

    /// Sets the `From` address.
    #[must_use]
    pub fn from(mut self, sender: impl Into<String>) -> Self {
        self.config.defaults.sender = Some(sender.into());
        self
    }

    /// Sets the receivers.
    #[must_use]
    pub fn receivers<I, S>(mut self, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.defaults.receivers = receivers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the subject format.
    ///
    /// Single-event mail replaces `{level}`, `{target}` and `{message}`;
    /// buffered mail replaces `{min_level}`, `{max_level}` and `{count}`.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.config.defaults.subject = Some(subject.into());
        self
    }

    /// Sets the text body template source.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.config.defaults.text = Some(text.into());
        self
    }

    /// Sets the HTML body template source.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.config.defaults.html = Some(html.into());
        self
    }

    /// Sets the least severe level that is mailed.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Delivers through `transport` instead of SMTP.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the optional collaborators.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Builds the handler configuration.
    ///
    /// # Errors
    ///
    /// Returns `MissingReceiver` if there is neither a receiver nor a
    /// username, or an error if the templates fail to load.
    pub fn build(self) -> Result<HandlerConfig> {
        let mut sender = EmailSender::new(self.config)?.with_capabilities(self.capabilities);
        if let Some(transport) = self.transport {
            sender = sender.with_shared_transport(transport);
        }
        HandlerConfig::from_sender(sender, self.level)
    }
}

fn report_failure(error: &Error) {
    eprintln!("mailforge: failed to send log mail: {error}");
}

fn subject_format(sender: &EmailSender) -> String {
    sender
        .config()
        .defaults
        .subject
        .clone()
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string())
}

/// Sends one email per event at or above the configured level.
///
/// Templates see `record` ([`LogRecord`]) and `msg` (the formatted record).
/// The default body is `{{ msg }}`.
#[derive(Debug)]
pub struct EmailLayer {
    sender: Mutex<EmailSender>,
    level: Level,
}

impl EmailLayer {
    /// Creates the layer.
    #[must_use]
    pub fn new(config: HandlerConfig) -> Self {
        let (sender, level) = config.into_sender(RECORD_TEXT);
        Self {
            sender: Mutex::new(sender),
            level,
        }
    }

    /// Sends one record.
    ///
    /// # Errors
    ///
    /// Returns any composition or transport error.
    pub fn emit(&self, record: &LogRecord) -> Result<()> {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let subject = subject_format(&sender)
            .replace("{level}", &record.level)
            .replace("{target}", &record.target)
            .replace("{message}", &record.message);

        let mut compose = Compose::new()
            .subject(subject)
            .param("record", serde_json::to_value(record)?)
            .param("msg", record.formatted());
        compose.error = record.error_report();
        sender.send(&compose)?;
        Ok(())
    }
}

impl<S: Subscriber> Layer<S> for EmailLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > self.level {
            return;
        }
        let Some(_guard) = EmitGuard::enter() else {
            return;
        };
        if let Err(e) = self.emit(&LogRecord::from_event(event)) {
            report_failure(&e);
        }
    }
}

/// Collects events and sends them in one email.
///
/// The buffer is sent when it reaches its capacity, on [`flush`], and when
/// the layer is dropped. Templates see `records`; the default body lists
/// one line per record.
///
/// [`flush`]: BufferedEmailLayer::flush
#[derive(Debug)]
pub struct BufferedEmailLayer {
    sender: Mutex<EmailSender>,
    buffer: Mutex<Vec<LogRecord>>,
    capacity: usize,
    level: Level,
}

impl BufferedEmailLayer {
    /// Creates the layer; a capacity of zero is treated as one.
    #[must_use]
    pub fn new(config: HandlerConfig, capacity: usize) -> Self {
        let (sender, level) = config.into_sender(RECORDS_TEXT);
        Self {
            sender: Mutex::new(sender),
            buffer: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            level,
        }
    }

    /// Maximum number of buffered records.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records waiting to be sent.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Adds a record, sending the buffer if it is full.
    ///
    /// # Errors
    ///
    /// Returns the error of a triggered flush.
    pub fn push(&self, record: LogRecord) -> Result<()> {
        let full = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.push(record);
            buffer.len() >= self.capacity
        };
        if full { self.flush() } else { Ok(()) }
    }

    /// Sends all buffered records as one email; nothing happens when empty.
    ///
    /// # Errors
    ///
    /// Returns any composition or transport error. The records are dropped
    /// either way.
    pub fn flush(&self) -> Result<()> {
        let records = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        let (Some(min), Some(max)) = (
            records.iter().map(LogRecord::severity).max(),
            records.iter().map(LogRecord::severity).min(),
        ) else {
            return Ok(());
        };

        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let subject = subject_format(&sender)
            .replace("{min_level}", min.as_str())
            .replace("{max_level}", max.as_str())
            .replace("{count}", &records.len().to_string());

        let mut compose = Compose::new()
            .subject(subject)
            .param("records", serde_json::to_value(&records)?);
        compose.error = records.iter().rev().find_map(LogRecord::error_report);
        sender.send(&compose)?;
        tracing::debug!(count = records.len(), "log records flushed");
        Ok(())
    }
}

impl<S: Subscriber> Layer<S> for BufferedEmailLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > self.level {
            return;
        }
        let Some(_guard) = EmitGuard::enter() else {
            return;
        };
        if let Err(e) = self.push(LogRecord::from_event(event)) {
            report_failure(&e);
        }
    }
}

impl Drop for BufferedEmailLayer {
    fn drop(&mut self) {
        let _guard = EmitGuard::enter();
        if let Err(e) = self.flush() {
            report_failure(&e);
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
    use mailforge_smtp::MemoryTransport;
    use tracing_subscriber::layer::SubscriberExt;

    fn builder(outbox: &MemoryTransport) -> HandlerConfigBuilder {
        HandlerConfig::builder("localhost", 25)
            .from("app@example.com")
            .receivers(["ops@example.com"])
            .transport(outbox.clone())
    }

    #[test]
    fn test_missing_receiver() {
        let err = HandlerConfig::builder("localhost", 25).build().unwrap_err();
        assert!(matches!(err, Error::MissingReceiver));
    }

    #[test]
    fn test_username_is_fallback_receiver() {
        let config = HandlerConfig::builder("localhost", 25)
            .credentials("me@example.com", "pw")
            .build()
            .unwrap();
        let defaults = &config.sender().config().defaults;
        assert_eq!(defaults.receivers, vec!["me@example.com"]);
        assert_eq!(defaults.subject.as_deref(), Some("Log record"));
    }

    #[test]
    fn test_layer_sends_per_event() {
        let outbox = MemoryTransport::new();
        let config = builder(&outbox)
            .subject("{level}: {message}")
            .level(Level::WARN)
            .build()
            .unwrap();
        let subscriber = tracing_subscriber::registry().with(EmailLayer::new(config));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("not mailed");
            tracing::error!(code = 7, "disk full");
        });

        let messages = outbox.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject(), Some("ERROR: disk full"));
        assert_eq!(messages[0].root.body_text().unwrap(), "disk full code=7\n");
    }

    #[test]
    fn test_buffered_layer_flushes_at_capacity_and_drop() {
        let outbox = MemoryTransport::new();
        let config = builder(&outbox)
            .subject("{count} records, {min_level}..{max_level}")
            .level(Level::INFO)
            .build()
            .unwrap();
        let subscriber =
            tracing_subscriber::registry().with(BufferedEmailLayer::new(config, 2));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first");
            tracing::error!("second");
            tracing::warn!("third");
            assert_eq!(outbox.messages().len(), 1);
        });

        let messages = outbox.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject(), Some("2 records, INFO..ERROR"));
        assert_eq!(messages[1].subject(), Some("1 records, WARN..WARN"));

        let body = messages[0].root.body_text().unwrap();
        assert!(body.contains("INFO"));
        assert!(body.contains(": first"));
        assert!(body.contains(": second"));
    }

    #[test]
    fn test_flush_on_empty_buffer() {
        let outbox = MemoryTransport::new();
        let layer = BufferedEmailLayer::new(builder(&outbox).build().unwrap(), 10);
        layer.flush().unwrap();
        assert_eq!(layer.pending(), 0);
        drop(layer);
        assert!(outbox.messages().is_empty());
    }

    #[test]
    fn test_custom_html_body() {
        let outbox = MemoryTransport::new();
        let config = builder(&outbox)
            .html("<b>{{ record.level }}</b> {{ record.message }}")
            .build()
            .unwrap();
        let layer = EmailLayer::new(config);

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("careful");
        });

        let message = &outbox.messages()[0];
        assert!(message.text_part().is_none());
        assert_eq!(
            message.html_part().unwrap().body_text().unwrap(),
            "<b>WARN</b> careful\n"
        );
    }
}
