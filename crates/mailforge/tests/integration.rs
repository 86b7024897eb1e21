//! Integration tests for message composition and sending.
//!
//! Messages go to an in-memory transport so the assembled MIME tree and the
//! transmitted bytes can be inspected without a server.

use std::collections::HashSet;
use std::fs;

use mailforge::table::{get_span, is_last_group_row};
use mailforge::{
    BodyImage, Compose, EmailSender, Error, ImageSpec, SenderConfig, Table, current_user,
};
use mailforge_mime::encoding::encode_base64;
use mailforge_smtp::MemoryTransport;

fn sender_with(outbox: &MemoryTransport) -> EmailSender {
    let config = SenderConfig::builder("localhost", 25)
        .domain("example.com")
        .build();
    EmailSender::new(config)
        .unwrap()
        .with_transport(outbox.clone())
}

fn base() -> Compose {
    Compose::new()
        .subject("Hi")
        .sender("a@b.com")
        .receiver("c@d.com")
}

#[test]
fn test_scenario_hello_user() {
    let outbox = MemoryTransport::new();
    let sender = sender_with(&outbox);

    let message = sender
        .get_message(&base().text("Hello {{ user }}"))
        .unwrap();

    assert_eq!(message.root.mime_type(), "text/plain");
    assert_eq!(
        message.root.body_text().unwrap(),
        format!("Hello {}\n", current_user())
    );
    assert_eq!(message.from(), Some("a@b.com"));
    assert_eq!(message.to(), Some("c@d.com"));
    assert_eq!(message.subject(), Some("Hi"));

    let wire = message.format().unwrap();
    assert!(wire.contains("From: a@b.com\r\n"));
    assert!(wire.contains("To: c@d.com\r\n"));
    assert!(wire.contains("Subject: Hi\r\n"));
    assert!(wire.contains("MIME-Version: 1.0\r\n"));
}

#[test]
fn test_root_content_types() {
    let sender = sender_with(&MemoryTransport::new());
    let root = |compose: Compose| sender.get_message(&compose).unwrap().root.mime_type();

    assert_eq!(root(base().text("t")), "text/plain");
    assert_eq!(root(base().html("<p>h</p>")), "multipart/mixed");
    assert_eq!(root(base().text("t").html("<p>h</p>")), "multipart/mixed");
    assert_eq!(root(base().text("t").attachment("a.txt", "x")), "multipart/mixed");
}

#[test]
fn test_body_without_directives_is_unchanged() {
    let sender = sender_with(&MemoryTransport::new());
    let body = "Numbers: 1, 2, 3.\nNo placeholders here.\n";
    let message = sender.get_message(&base().text(body)).unwrap();
    assert_eq!(message.root.body_text().unwrap(), body);
}

#[test]
fn test_text_attachment_round_trip() {
    let sender = sender_with(&MemoryTransport::new());
    let message = sender
        .get_message(&base().text("see attached").attachment("data.txt", "Some content"))
        .unwrap();

    let attachment = &message.root.parts[1];
    assert_eq!(attachment.filename().as_deref(), Some("data.txt"));
    assert_eq!(attachment.body_text().unwrap(), "Some content");

    let wire = message.format().unwrap();
    assert!(wire.contains("filename=\"data.txt\""));
    assert!(wire.contains(&encode_base64(b"Some content")));
}

#[test]
fn test_file_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let sender = sender_with(&MemoryTransport::new());
    let message = sender
        .get_message(&base().text("t").attach_file(&path))
        .unwrap();
    assert_eq!(message.root.parts[1].filename().as_deref(), Some("report.csv"));
    assert_eq!(message.root.parts[1].body, b"a,b\n1,2\n");

    let mut compose = base().text("t");
    compose.attachments.add_file("this is not a path");
    let err = sender.get_message(&compose).unwrap_err();
    assert!(matches!(err, Error::InvalidReference(_)));
}

#[test]
fn test_span_examples() {
    let labels = ["a", "a", "b"];
    assert_eq!(get_span(&labels, 0), 2);
    assert_eq!(get_span(&labels, 1), 0);
    assert_eq!(get_span(&labels, 2), 1);
}

#[test]
fn test_last_group_row_example() {
    let rows: Vec<Vec<String>> = [("x", "1"), ("x", "2"), ("y", "1")]
        .iter()
        .map(|(a, b)| vec![(*a).to_string(), (*b).to_string()])
        .collect();
    assert!(is_last_group_row(1, &rows, Some(0)));
    assert!(is_last_group_row(1, &rows, None));
    assert!(!is_last_group_row(0, &rows, None));
}

#[test]
fn test_message_ids_are_unique() {
    let sender = sender_with(&MemoryTransport::new());
    let ids: HashSet<String> = (0..50)
        .map(|_| {
            sender
                .get_message(&base().text("t"))
                .unwrap()
                .message_id()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(ids.len(), 50);
    assert!(ids.iter().all(|id| id.ends_with("@example.com>")));
}

#[test]
fn test_image_missing_subtype() {
    let sender = sender_with(&MemoryTransport::new());
    let image = ImageSpec {
        content: Some(vec![1, 2, 3]),
        ..ImageSpec::default()
    };
    let err = sender
        .get_message(&base().html("{{ img }}").image("img", image))
        .unwrap_err();
    match err {
        Error::MissingField(fields) => assert_eq!(fields, vec!["subtype"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_ambiguous_text_body() {
    let outbox = MemoryTransport::new();
    let mut sender = sender_with(&outbox);
    let err = sender
        .send(&base().text("{{ broken").text_template("body.txt"))
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousBody { channel: "text" }));
    assert!(outbox.messages().is_empty());
}

#[test]
fn test_inline_images_share_related_part() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.gif");
    fs::write(&path, b"GIF89a").unwrap();

    let sender = sender_with(&MemoryTransport::new());
    let message = sender
        .get_message(
            &base()
                .text("fallback")
                .html("<p>{{ chart }}</p><p>{{ logo }}</p>")
                .image("chart", BodyImage::from(path.as_path()))
                .image("logo", vec![137u8, 80, 78, 71]),
        )
        .unwrap();

    let alternative = &message.root.parts[0];
    assert_eq!(alternative.parts[0].mime_type(), "text/plain");
    let related = &alternative.parts[1];
    assert_eq!(related.mime_type(), "multipart/related");
    assert_eq!(related.parts.len(), 3);
    assert_eq!(related.parts[1].mime_type(), "image/gif");
    assert_eq!(related.parts[2].mime_type(), "image/png");

    let html = related.parts[0].body_text().unwrap();
    for image in &related.parts[1..] {
        let cid = image.content_id().unwrap();
        assert!(html.contains(&format!("<img src=\"cid:{cid}\">")));
    }
}

#[test]
fn test_tables_in_both_bodies() {
    let mut table = Table::new(["city", "visits"]);
    table.push_row(["Oslo", "12"]).unwrap();
    table.push_row(["Lima", "7"]).unwrap();

    let sender = sender_with(&MemoryTransport::new());
    let message = sender
        .get_message(
            &base()
                .text("{{ visits }}")
                .html("<div>{{ visits }}</div>")
                .table("visits", table.clone()),
        )
        .unwrap();

    let text = message.text_part().unwrap().body_text().unwrap();
    assert_eq!(text, format!("{}\n", table.to_text()));
    let html = message.html_part().unwrap().body_text().unwrap();
    assert!(html.contains("Oslo"));
    assert!(html.contains("<td style="));
}

#[test]
fn test_template_directories() {
    let dir = tempfile::tempdir().unwrap();
    let html_dir = dir.path().join("html");
    let text_dir = dir.path().join("text");
    fs::create_dir_all(&html_dir).unwrap();
    fs::create_dir_all(&text_dir).unwrap();
    fs::write(
        html_dir.join("welcome.html"),
        "<h1>Welcome {{ sender.first_name }}</h1>",
    )
    .unwrap();
    fs::write(text_dir.join("welcome.txt"), "Welcome {{ name }}").unwrap();

    let mut sender = sender_with(&MemoryTransport::new());
    sender
        .set_template_paths(Some(&html_dir), Some(&text_dir), None, None)
        .unwrap();

    let compose = Compose::new()
        .subject("Welcome")
        .sender("jane.doe@example.com")
        .receiver("x@example.com")
        .html_template("welcome.html")
        .text_template("welcome.txt")
        .param("name", "Jane");
    let message = sender.get_message(&compose).unwrap();
    assert_eq!(
        message.html_part().unwrap().body_text().unwrap(),
        "<h1>Welcome Jane</h1>\n"
    );
    assert_eq!(
        message.text_part().unwrap().body_text().unwrap(),
        "Welcome Jane\n"
    );

    let raw = sender.get_message(&compose.use_templating(false)).unwrap();
    assert_eq!(
        raw.text_part().unwrap().body_text().unwrap(),
        "Welcome {{ name }}\n"
    );
}

#[test]
fn test_bcc_only_in_envelope() {
    let outbox = MemoryTransport::new();
    let mut sender = sender_with(&outbox);
    sender
        .send(&base().bcc("boss@example.com").text("quiet copy"))
        .unwrap();

    let delivery = &outbox.deliveries()[0];
    assert!(!delivery.wire.contains("boss@example.com"));
    assert!(!delivery.wire.to_lowercase().contains("bcc:"));
    let recipients: Vec<String> = delivery.envelope.to().iter().map(ToString::to_string).collect();
    assert!(recipients.contains(&"c@d.com".to_string()));
    assert!(recipients.contains(&"boss@example.com".to_string()));
}

#[test]
fn test_many_receivers_fit_line_limit() {
    let outbox = MemoryTransport::new();
    let mut sender = sender_with(&outbox);
    let receivers: Vec<String> = (0..60).map(|n| format!("receiver{n}@example.com")).collect();
    sender
        .send(
            &Compose::new()
                .subject("Hyvää huomenta, tässä on viikoittainen raportti sinulle!")
                .sender("Jörg Müller <jorg@example.com>")
                .receivers(receivers.clone())
                .attachment("résumé.txt", "cv")
                .text("weekly"),
        )
        .unwrap();

    let delivery = &outbox.deliveries()[0];
    assert!(delivery.wire.split("\r\n").all(|line| line.len() <= 998));
    assert!(delivery.wire.contains("<jorg@example.com>\r\n"));
    assert!(delivery.wire.contains("filename*=utf-8''r%C3%A9sum%C3%A9.txt"));
    assert_eq!(delivery.envelope.to().len(), 60);
}

#[test]
fn test_configured_defaults() {
    let outbox = MemoryTransport::new();
    let config = SenderConfig::builder("localhost", 25)
        .credentials("robot@example.com", "pw")
        .receivers(["team@example.com"])
        .subject("Nightly build")
        .build();
    let mut sender = EmailSender::new(config)
        .unwrap()
        .with_transport(outbox.clone());

    let message = sender.send(&Compose::new().text("green")).unwrap();
    assert_eq!(message.from(), Some("robot@example.com"));
    assert_eq!(message.to(), Some("team@example.com"));
    assert_eq!(message.subject(), Some("Nightly build"));
}

#[test]
fn test_session_scope() {
    let outbox = MemoryTransport::new();
    let mut sender = sender_with(&outbox);
    {
        let mut session = sender.session().unwrap();
        for n in 0..3 {
            session
                .send(&base().text(format!("message {n}")))
                .unwrap();
        }
    }
    assert!(!sender.is_alive());
    assert_eq!(outbox.connection_count(), 1);
    assert_eq!(outbox.messages().len(), 3);
}
