//! Assembly of complete MIME messages.
//!
//! The root of a message depends on what it carries:
//!
//! - text only: a single `text/plain` part
//! - HTML, or any attachment: `multipart/mixed` holding a
//!   `multipart/alternative` (text before HTML) followed by the attachments
//! - HTML with inline images: the HTML part is wrapped in `multipart/related`
//!   together with the images

use crate::body::{BodyInputs, BodyRenderer, Channel, check_body};
use crate::capability::Capabilities;
use crate::config::{Compose, Resolved, SenderConfig};
use crate::error::{Error, Result};
use crate::templates::Templates;
use chrono::Local;
use mailforge_mime::id::make_msgid;
use mailforge_mime::{Headers, Message, Part};
use tracing::debug;

/// Builds messages from a configuration, templates and collaborators.
#[derive(Debug, Clone, Copy)]
pub struct MessageAssembler<'a> {
    config: &'a SenderConfig,
    templates: &'a Templates,
    capabilities: &'a Capabilities,
}

impl<'a> MessageAssembler<'a> {
    /// Creates an assembler; nothing is mutated during assembly.
    #[must_use]
    pub const fn new(
        config: &'a SenderConfig,
        templates: &'a Templates,
        capabilities: &'a Capabilities,
    ) -> Self {
        Self {
            config,
            templates,
            capabilities,
        }
    }

    /// Assembles one message.
    ///
    /// # Errors
    ///
    /// - `MissingSubject` if neither the call nor the defaults give a subject
    /// - `AmbiguousBody` if a channel has both an inline body and a template
    /// - any rendering, image or attachment error
    pub fn assemble(&self, compose: &Compose) -> Result<Message> {
        let resolved = self.config.resolve(compose);
        let subject = resolved.subject.clone().ok_or(Error::MissingSubject)?;
        check_body(
            Channel::Text,
            resolved.text.as_deref(),
            resolved.text_template.as_deref(),
        )?;
        check_body(
            Channel::Html,
            resolved.html.as_deref(),
            resolved.html_template.as_deref(),
        )?;

        let templating = self.config.templating_for(compose);
        let domain = self.config.id_domain();
        let headers = build_headers(&resolved, &subject, &domain);

        let inputs = BodyInputs {
            sender: resolved.sender.as_deref(),
            tables: &compose.tables,
            extras: &compose.params,
            error: compose.error.as_ref(),
        };

        let text = BodyRenderer::new(Channel::Text, self.templates, self.capabilities)
            .theme(self.config.text_theme.as_deref())
            .use_templating(templating)
            .render(
                resolved.text.as_deref(),
                resolved.text_template.as_deref(),
                &inputs,
                &[],
            )?;

        let has_html = resolved.html.is_some() || resolved.html_template.is_some();
        let mut images = Vec::new();
        if has_html && templating {
            for (name, image) in &compose.images {
                let content_id = content_id(&domain);
                images.push((name.clone(), image.to_part(&content_id)?, content_id));
            }
        }
        let image_ids: Vec<(String, String)> = images
            .iter()
            .map(|(name, _, cid)| (name.clone(), cid.clone()))
            .collect();

        let html = BodyRenderer::new(Channel::Html, self.templates, self.capabilities)
            .theme(self.config.html_theme.as_deref())
            .use_templating(templating)
            .render(
                resolved.html.as_deref(),
                resolved.html_template.as_deref(),
                &inputs,
                &image_ids,
            )?;

        let text_part = text.map(|text| Part::text("plain", &text));
        let html_part = html.map(|html| {
            let part = Part::text("html", &html);
            if images.is_empty() {
                part
            } else {
                let mut related = vec![part];
                related.extend(images.into_iter().map(|(_, image, _)| image));
                Part::multipart("related", related)
            }
        });
        let attachments = compose.attachments.to_parts(self.capabilities)?;
        let attachment_count = attachments.len();

        let root = compose_root(text_part, html_part, attachments);
        debug!(
            subject = %subject,
            receivers = resolved.receivers.len(),
            cc = resolved.cc.len(),
            bcc = resolved.bcc.len(),
            images = image_ids.len(),
            attachments = attachment_count,
            content_type = %root.mime_type(),
            "message assembled"
        );
        Ok(Message::new(headers, root))
    }
}

/// Fresh Content-ID (without brackets) in the given domain.
fn content_id(domain: &str) -> String {
    make_msgid(domain)
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

fn build_headers(resolved: &Resolved, subject: &str, domain: &str) -> Headers {
    let mut headers = Headers::new();
    if let Some(sender) = &resolved.sender {
        headers.add("From", sender.as_str());
    }
    headers.add("Subject", subject);
    for (name, addresses) in [
        ("To", &resolved.receivers),
        ("Cc", &resolved.cc),
        ("Bcc", &resolved.bcc),
    ] {
        if !addresses.is_empty() {
            headers.add(name, addresses.join(", "));
        }
    }
    headers.add("Message-ID", make_msgid(domain));
    headers.add("Date", Local::now().to_rfc2822());

    for (name, value) in &resolved.headers {
        headers.set(name.as_str(), value.as_str());
    }
    headers
}

fn compose_root(text: Option<Part>, html: Option<Part>, attachments: Vec<Part>) -> Part {
    match (text, html) {
        (Some(text), None) if attachments.is_empty() => text,
        (None, None) if attachments.is_empty() => Part::text("plain", ""),
        (text, html) => {
            let bodies: Vec<Part> = text.into_iter().chain(html).collect();
            let mut parts = Vec::with_capacity(attachments.len() + 1);
            if !bodies.is_empty() {
                parts.push(Part::multipart("alternative", bodies));
            }
            parts.extend(attachments);
            Part::multipart("mixed", parts)
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
    use crate::image::ImageSpec;

    fn config() -> SenderConfig {
        SenderConfig::builder("localhost", 25)
            .domain("example.com")
            .sender("me@example.com")
            .build()
    }

    fn assemble(compose: &Compose) -> Result<Message> {
        let config = config();
        let templates = Templates::new().unwrap();
        let caps = Capabilities::none();
        MessageAssembler::new(&config, &templates, &caps).assemble(compose)
    }

    fn header_names(message: &Message) -> Vec<&str> {
        message.headers.iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_missing_subject() {
        let err = assemble(&Compose::new().text("hi")).unwrap_err();
        assert!(matches!(err, Error::MissingSubject));
    }

    #[test]
    fn test_ambiguous_body_fails_before_rendering() {
        let err = assemble(
            &Compose::new()
                .subject("s")
                .html("<p>{{ broken")
                .html_template("x.html"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AmbiguousBody { channel: "html" }));
    }

    #[test]
    fn test_header_order() {
        let message = assemble(
            &Compose::new()
                .subject("Hi")
                .receiver("a@example.com")
                .receiver("b@example.com")
                .cc("c@example.com")
                .bcc("d@example.com")
                .text("body"),
        )
        .unwrap();
        assert_eq!(
            header_names(&message),
            vec!["From", "Subject", "To", "Cc", "Bcc", "Message-ID", "Date"]
        );
        assert_eq!(message.to(), Some("a@example.com, b@example.com"));
        assert!(message.message_id().unwrap().ends_with("@example.com>"));
    }

    #[test]
    fn test_custom_headers_replace_in_place() {
        let message = assemble(
            &Compose::new()
                .subject("Hi")
                .text("body")
                .header("subject", "Replaced")
                .header("X-Mailer", "mailforge"),
        )
        .unwrap();
        assert_eq!(
            header_names(&message),
            vec!["From", "subject", "Message-ID", "Date", "X-Mailer"]
        );
        assert_eq!(message.subject(), Some("Replaced"));
    }

    #[test]
    fn test_text_only_is_single_part() {
        let message = assemble(&Compose::new().subject("s").text("Hello")).unwrap();
        assert_eq!(message.root.mime_type(), "text/plain");
        assert_eq!(message.root.body_text().unwrap(), "Hello\n");
    }

    #[test]
    fn test_html_only_is_mixed() {
        let message = assemble(&Compose::new().subject("s").html("<p>Hi</p>")).unwrap();
        assert_eq!(message.root.mime_type(), "multipart/mixed");
        assert_eq!(message.root.parts[0].mime_type(), "multipart/alternative");
        assert_eq!(message.root.parts[0].parts[0].mime_type(), "text/html");
    }

    #[test]
    fn test_text_before_html() {
        let message = assemble(&Compose::new().subject("s").text("t").html("<p>h</p>")).unwrap();
        let alternative = &message.root.parts[0];
        let types: Vec<String> = alternative.parts.iter().map(Part::mime_type).collect();
        assert_eq!(types, vec!["text/plain", "text/html"]);
    }

    #[test]
    fn test_text_with_attachment_is_mixed() {
        let message = assemble(
            &Compose::new()
                .subject("s")
                .text("t")
                .attachment("data.txt", "Some content"),
        )
        .unwrap();
        assert_eq!(message.root.mime_type(), "multipart/mixed");
        assert_eq!(message.root.parts.len(), 2);
        assert_eq!(message.root.parts[1].filename().as_deref(), Some("data.txt"));
    }

    #[test]
    fn test_attachments_only() {
        let message = assemble(&Compose::new().subject("s").attachment("a.txt", "x")).unwrap();
        assert_eq!(message.root.mime_type(), "multipart/mixed");
        assert_eq!(message.root.parts.len(), 1);
        assert_eq!(message.root.parts[0].mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_inline_image() {
        let message = assemble(
            &Compose::new()
                .subject("s")
                .html("<h1>Logo</h1>{{ logo }}")
                .image("logo", ImageSpec::new(vec![1, 2, 3], "png")),
        )
        .unwrap();
        let related = &message.root.parts[0].parts[0];
        assert_eq!(related.mime_type(), "multipart/related");
        let image = &related.parts[1];
        assert_eq!(image.mime_type(), "image/png");
        let cid = image.content_id().unwrap();
        assert!(cid.ends_with("@example.com"));

        let html = related.parts[0].body_text().unwrap();
        assert_eq!(html, format!("<h1>Logo</h1><img src=\"cid:{cid}\">\n"));
    }

    #[test]
    fn test_images_ignored_without_templating() {
        let message = assemble(
            &Compose::new()
                .subject("s")
                .html("{{ logo }}")
                .image("logo", vec![1u8, 2])
                .use_templating(false),
        )
        .unwrap();
        let html = &message.root.parts[0].parts[0];
        assert_eq!(html.mime_type(), "text/html");
        assert_eq!(html.body_text().unwrap(), "{{ logo }}\n");
    }

    #[test]
    fn test_image_error_aborts() {
        let err = assemble(
            &Compose::new()
                .subject("s")
                .html("{{ logo }}")
                .image("logo", ImageSpec::default()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }
}
