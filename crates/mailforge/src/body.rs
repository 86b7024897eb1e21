//! Text and HTML body rendering.

use crate::address::EmailAddress;
use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::error_report::{ErrorRenderer, ErrorReport, RenderKind};
use crate::table::BodyTable;
use crate::table::theme::render_table;
use crate::templates::{TemplateKind, Templates};
use chrono::Local;
use serde_json::{Map, Value};
use tera::Context;
use tracing::trace;

/// Body channel of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `text/plain` body.
    Text,
    /// `text/html` body.
    Html,
}

impl Channel {
    /// Lowercase channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
        }
    }

    const fn template_kind(self) -> TemplateKind {
        match self {
            Self::Text => TemplateKind::Text,
            Self::Html => TemplateKind::Html,
        }
    }

    const fn error_kind(self) -> RenderKind {
        match self {
            Self::Text => RenderKind::Text,
            Self::Html => RenderKind::HtmlInline,
        }
    }
}

/// Name of this machine, empty if it cannot be determined.
#[must_use]
pub fn node_name() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Login name of the current user, empty if it cannot be determined.
#[must_use]
pub fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
        .unwrap_or_default()
}

/// Fails if both an inline body and a template name are given.
///
/// # Errors
///
/// Returns `AmbiguousBody` naming the channel.
pub fn check_body(channel: Channel, body: Option<&str>, template: Option<&str>) -> Result<()> {
    if body.is_some() && template.is_some() {
        return Err(Error::AmbiguousBody {
            channel: channel.as_str(),
        });
    }
    Ok(())
}

/// Values available to both body templates.
#[derive(Debug, Clone, Copy)]
pub struct BodyInputs<'a> {
    /// Resolved `From` address.
    pub sender: Option<&'a str>,
    /// Named tables, rendered per channel.
    pub tables: &'a [(String, BodyTable)],
    /// Caller-supplied values; these win on name collisions.
    pub extras: &'a Map<String, Value>,
    /// Error shown through `error` / `exception`.
    pub error: Option<&'a ErrorReport>,
}

/// Renders the body of one channel.
#[derive(Debug, Clone, Copy)]
pub struct BodyRenderer<'a> {
    channel: Channel,
    templates: &'a Templates,
    capabilities: &'a Capabilities,
    theme: Option<&'a str>,
    use_templating: bool,
}

impl<'a> BodyRenderer<'a> {
    /// Creates a renderer with templating on and no table theme.
    #[must_use]
    pub const fn new(channel: Channel, templates: &'a Templates, capabilities: &'a Capabilities) -> Self {
        Self {
            channel,
            templates,
            capabilities,
            theme: None,
            use_templating: true,
        }
    }

    /// Sets the table theme; `None` uses the native table rendering.
    #[must_use]
    pub const fn theme(mut self, theme: Option<&'a str>) -> Self {
        self.theme = theme;
        self
    }

    /// Turns templating on or off.
    #[must_use]
    pub const fn use_templating(mut self, enabled: bool) -> Self {
        self.use_templating = enabled;
        self
    }

    /// Renders the inline body or named template, if any.
    ///
    /// `images` maps variable names to Content-IDs; each becomes an
    /// `<img src="cid:...">` tag in HTML bodies. Without templating the body
    /// (or the template's source) passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousBody` if both body and template are given, or any
    /// table or template error.
    pub fn render(
        &self,
        body: Option<&str>,
        template: Option<&str>,
        inputs: &BodyInputs<'_>,
        images: &[(String, String)],
    ) -> Result<Option<String>> {
        check_body(self.channel, body, template)?;
        let kind = self.channel.template_kind();

        if !self.use_templating {
            return match (body, template) {
                (Some(body), _) => Ok(Some(body.to_string())),
                (None, Some(name)) => self.templates.source(kind, name).map(Some),
                (None, None) => Ok(None),
            };
        }

        let rendered = match (body, template) {
            (Some(body), _) => {
                let context = self.context(inputs, images)?;
                self.templates.render_str(kind, body, &context)?
            }
            (None, Some(name)) => {
                let context = self.context(inputs, images)?;
                self.templates.render(kind, name, &context)?
            }
            (None, None) => return Ok(None),
        };
        trace!(channel = self.channel.as_str(), bytes = rendered.len(), "body rendered");
        Ok(Some(rendered))
    }

    /// Template parameters, later entries overriding earlier ones:
    /// tables, built-ins, images, caller extras.
    fn context(&self, inputs: &BodyInputs<'_>, images: &[(String, String)]) -> Result<Context> {
        let mut context = Context::new();

        for (name, table) in inputs.tables {
            let rendered = render_table(
                table,
                self.channel,
                self.theme,
                self.templates,
                self.capabilities,
            )?;
            context.insert(name.as_str(), &rendered);
        }

        context.insert("node", &node_name());
        context.insert("user", &current_user());
        context.insert("now", &Local::now());
        context.insert("sender", &inputs.sender.map(EmailAddress::new));

        let error = ErrorRenderer::with_kind(self.channel.error_kind(), inputs.error.cloned());
        context.insert("error", &error.render());
        context.insert("exception", &inputs.error);

        if self.channel == Channel::Html {
            for (name, cid) in images {
                context.insert(name.as_str(), &format!("<img src=\"cid:{cid}\">"));
            }
        }

        for (name, value) in inputs.extras {
            context.insert(name.as_str(), value);
        }
        Ok(context)
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
    use crate::table::Table;
    use serde_json::json;

    fn empty_inputs(extras: &Map<String, Value>) -> BodyInputs<'_> {
        BodyInputs {
            sender: Some("john.smith@example.com"),
            tables: &[],
            extras,
            error: None,
        }
    }

    #[test]
    fn test_ambiguous_body() {
        let err = check_body(Channel::Html, Some("<p>hi</p>"), Some("body.html")).unwrap_err();
        assert!(matches!(err, Error::AmbiguousBody { channel: "html" }));
        assert!(check_body(Channel::Text, Some("hi"), None).is_ok());
    }

    #[test]
    fn test_plain_string_is_unchanged() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let renderer = BodyRenderer::new(Channel::Text, &templates, &caps);

        let body = "Plain body, no directives.\nSecond line.";
        let rendered = renderer
            .render(Some(body), None, &empty_inputs(&extras), &[])
            .unwrap();
        assert_eq!(rendered.as_deref(), Some(body));
    }

    #[test]
    fn test_builtin_parameters() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let renderer = BodyRenderer::new(Channel::Text, &templates, &caps);

        let rendered = renderer
            .render(
                Some("{{ sender.full_name }} from {{ sender.organization }} as {{ user }}"),
                None,
                &empty_inputs(&extras),
                &[],
            )
            .unwrap()
            .unwrap();
        assert_eq!(rendered, format!("John Smith from Example as {}", current_user()));
    }

    #[test]
    fn test_extras_override_builtins() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let mut extras = Map::new();
        extras.insert("user".to_string(), json!("override"));
        extras.insert("items".to_string(), json!([1, 2, 3]));
        let renderer = BodyRenderer::new(Channel::Text, &templates, &caps);

        let rendered = renderer
            .render(
                Some("{{ user }}:{% for i in items %}{{ i }}{% endfor %}"),
                None,
                &empty_inputs(&extras),
                &[],
            )
            .unwrap()
            .unwrap();
        assert_eq!(rendered, "override:123");
    }

    #[test]
    fn test_error_parameter() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let report = ErrorReport::new("IoError", "disk full");
        let inputs = BodyInputs {
            error: Some(&report),
            ..empty_inputs(&extras)
        };
        let source = "{% if error %}{{ exception.exception_type }}|{{ error }}{% else %}ok{% endif %}";

        let text = BodyRenderer::new(Channel::Text, &templates, &caps)
            .render(Some(source), None, &inputs, &[])
            .unwrap()
            .unwrap();
        assert!(text.starts_with("IoError|Traceback (most recent call last):"));
        assert!(text.ends_with("IoError: disk full"));

        let html = BodyRenderer::new(Channel::Html, &templates, &caps)
            .render(Some(source), None, &inputs, &[])
            .unwrap()
            .unwrap();
        assert!(html.contains("<span style=\"color: red; font-weight: bold\">IoError</span>"));

        let clean = BodyRenderer::new(Channel::Text, &templates, &caps)
            .render(Some(source), None, &empty_inputs(&extras), &[])
            .unwrap()
            .unwrap();
        assert_eq!(clean, "ok");
    }

    #[test]
    fn test_images_only_in_html() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let images = vec![("logo".to_string(), "abc@example.com".to_string())];

        let html = BodyRenderer::new(Channel::Html, &templates, &caps)
            .render(Some("{{ logo }}"), None, &empty_inputs(&extras), &images)
            .unwrap()
            .unwrap();
        assert_eq!(html, "<img src=\"cid:abc@example.com\">");

        let text = BodyRenderer::new(Channel::Text, &templates, &caps)
            .render(Some("{{ logo | default(value='none') }}"), None, &empty_inputs(&extras), &images)
            .unwrap()
            .unwrap();
        assert_eq!(text, "none");
    }

    #[test]
    fn test_tables_use_channel_theme() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let mut table = Table::new(["a"]);
        table.push_row(["1"]).unwrap();
        let tables = vec![("report".to_string(), BodyTable::from(table.clone()))];
        let inputs = BodyInputs {
            tables: &tables,
            ..empty_inputs(&extras)
        };

        let html = BodyRenderer::new(Channel::Html, &templates, &caps)
            .theme(Some("modest"))
            .render(Some("{{ report }}"), None, &inputs, &[])
            .unwrap()
            .unwrap();
        assert!(html.contains("<td style="));

        let text = BodyRenderer::new(Channel::Text, &templates, &caps)
            .render(Some("{{ report }}"), None, &inputs, &[])
            .unwrap()
            .unwrap();
        assert_eq!(text, table.to_text());
    }

    #[test]
    fn test_templating_disabled() {
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let renderer = BodyRenderer::new(Channel::Text, &templates, &caps).use_templating(false);

        let inline = renderer
            .render(Some("Hi {{ user }}"), None, &empty_inputs(&extras), &[])
            .unwrap();
        assert_eq!(inline.as_deref(), Some("Hi {{ user }}"));
        assert!(renderer.render(None, None, &empty_inputs(&extras), &[]).unwrap().is_none());

        let html_templates = BodyRenderer::new(Channel::Html, &templates, &caps).use_templating(false);
        let err = html_templates
            .render(None, Some("missing.html"), &empty_inputs(&extras), &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));
    }

    #[test]
    fn test_templating_disabled_reads_added_template() {
        let mut templates = Templates::new().unwrap();
        templates
            .add_template(TemplateKind::Text, "welcome.txt", "Hi {{ user }}")
            .unwrap();
        let caps = Capabilities::none();
        let extras = Map::new();
        let renderer = BodyRenderer::new(Channel::Text, &templates, &caps).use_templating(false);

        for name in ["welcome.txt", "welcome"] {
            let raw = renderer
                .render(None, Some(name), &empty_inputs(&extras), &[])
                .unwrap();
            assert_eq!(raw.as_deref(), Some("Hi {{ user }}"));
        }
    }
}
