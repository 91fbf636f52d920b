//! Integration tests: decoding real-world shaped messages end to end.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailpart::config::DecodeConfig;
use mailpart::decode_raw;
use mailpart::error::DecodeError;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

fn writing_to(dir: &Path) -> DecodeConfig {
    DecodeConfig {
        attachments_dir: Some(dir.to_path_buf()),
        ..DecodeConfig::default()
    }
}

// ─── Text and a single attachment ───────────────────────────────────

#[test]
fn test_simple_attachment_bodies() {
    let msg = decode_raw("1", &read_fixture("simple_attachment.eml"), &DecodeConfig::default())
        .unwrap();

    assert!(msg.text_plain.contains("Please find the report attached."));
    assert!(msg.text_plain.contains("Café on Friday?"));
    assert!(!msg.text_plain.contains("multi-part message"));
    assert!(msg.text_html.is_empty());
    assert_eq!(msg.charset, "UTF-8");
}

#[test]
fn test_simple_attachment_metadata() {
    let msg = decode_raw("1", &read_fixture("simple_attachment.eml"), &DecodeConfig::default())
        .unwrap();
    assert_eq!(msg.attachments().len(), 1);

    let att = &msg.attachments()[0];
    assert_eq!(att.id.as_deref(), Some("8a10230cfc4d190112c0831584d08485"));
    assert_eq!(att.filename, "report.pdf");
    assert_eq!(att.orig_filename.as_deref(), Some("report"));
    assert_eq!(att.name, None);
    assert_eq!(att.mime_type.as_deref(), Some("application/pdf"));
    assert_eq!(att.data, "%PDF-1.4\n%äüöß\n".as_bytes());
    assert!(att.location.is_none(), "nothing is filed without a base directory");

    let record = att.to_record();
    assert_eq!(record.filepath, "");
    assert_eq!(record.orig_name, "");
}

#[test]
fn test_simple_attachment_is_written() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let msg = decode_raw("17", &read_fixture("simple_attachment.eml"), &writing_to(tmp.path()))
        .unwrap();

    let att = &msg.attachments()[0];
    let expected = "2020/01/17_8a10230cfc4d190112c0831584d08485_report.pdf";
    assert_eq!(att.to_record().filepath, expected);

    let written = tmp.child(expected);
    written.assert(predicate::path::is_file());
    assert_eq!(std::fs::read(written.path()).unwrap(), att.data);
}

#[test]
fn test_redecode_is_idempotent() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let raw = read_fixture("simple_attachment.eml");
    let first = decode_raw("17", &raw, &writing_to(tmp.path())).unwrap();
    let second = decode_raw("17", &raw, &writing_to(tmp.path())).unwrap();

    assert_eq!(first, second);
    let entries: Vec<_> = std::fs::read_dir(tmp.path().join("2020/01"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1);
}

// ─── Nested structures ──────────────────────────────────────────────

#[test]
fn test_related_alternative_inline_image() {
    let msg = decode_raw("nl", &read_fixture("related_inline.eml"), &DecodeConfig::default())
        .unwrap();

    assert_eq!(msg.text_plain, "Our logo is below.");
    assert_eq!(msg.charset, "us-ascii");
    assert_eq!(msg.text_html, r#"<html><body><img src="cid:logo@x"></body></html>"#);

    let logo = msg.attachment("logo@x").unwrap();
    assert_eq!(logo.filename, "logo.png");
    assert_eq!(logo.name.as_deref(), Some("logo.png"));
    assert_eq!(logo.data, b"\x89PNG\r\n\x1a\n");

    assert_eq!(
        msg.internal_link_placeholders(),
        vec![("logo@x".to_string(), "cid:logo@x".to_string())]
    );
}

#[test]
fn test_inline_links_point_at_filed_attachment() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let msg = decode_raw("nl", &read_fixture("related_inline.eml"), &writing_to(tmp.path()))
        .unwrap();

    // 09:30 +0200 is still May in UTC
    tmp.child("2024/05/nl_logo@x_logo.png")
        .assert(predicate::path::is_file());
    assert_eq!(
        msg.replace_internal_links("https://files.example.com/att"),
        r#"<html><body><img src="https://files.example.com/att/nl_logo@x_logo.png"></body></html>"#
    );
}

#[test]
fn test_forwarded_message() {
    let msg = decode_raw("5", &read_fixture("forwarded.eml"), &DecodeConfig::default()).unwrap();

    assert_eq!(msg.text_plain, "See the forwarded message.Inner body");
    assert_eq!(msg.charset, "utf-8");

    let csv = &msg.attachments()[0];
    assert_eq!(msg.attachments().len(), 1);
    assert_eq!(csv.filename, "data.csv");
    assert_eq!(csv.data, b"a,b\n1,2");
    // Outer context, inner position 2.2
    assert_eq!(csv.id.as_deref(), Some("3c8304f9fac031b2f638119abc390a27"));
}

// ─── Charsets ───────────────────────────────────────────────────────

#[test]
fn test_latin1_quoted_printable() {
    let msg = decode_raw("3", &read_fixture("latin1.eml"), &DecodeConfig::default()).unwrap();
    assert_eq!(msg.text_plain.trim_end(), "Un café crème, s'il vous plaît.");
    assert_eq!(msg.charset, "ISO-8859-1");
    assert!(msg.attachments().is_empty());
}

// ─── Strictness ─────────────────────────────────────────────────────

#[test]
fn test_missing_encoding_lenient_and_strict() {
    let raw = read_fixture("no_encoding.eml");

    let msg = decode_raw("4", &raw, &DecodeConfig::default()).unwrap();
    let blob = &msg.attachments()[0];
    assert_eq!(blob.data, b"Hello blob");
    assert_eq!(blob.filename, "blob.bin");
    assert_eq!(msg.text_plain, "body text");

    let strict = DecodeConfig {
        strict_encoding: true,
        ..DecodeConfig::default()
    };
    let err = decode_raw("4", &raw, &strict).unwrap_err();
    assert!(matches!(err, DecodeError::MissingEncoding { ref part } if part == "2"));
}

#[test]
fn test_skip_attachments_writes_nothing() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let config = DecodeConfig {
        skip_attachments: true,
        ..writing_to(tmp.path())
    };
    let msg = decode_raw("1", &read_fixture("simple_attachment.eml"), &config).unwrap();

    assert!(msg.attachments().is_empty());
    assert!(msg.text_plain.contains("report attached"));
    tmp.child("2020").assert(predicate::path::missing());
}

#[test]
fn test_unparsable_date() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let raw = read_fixture("bad_date.eml");

    let strict = DecodeConfig {
        strict_dates: true,
        ..writing_to(tmp.path())
    };
    let err = decode_raw("6", &raw, &strict).unwrap_err();
    assert!(matches!(err, DecodeError::UnparsableDate(ref d) if d == "sometime soon"));

    let msg = decode_raw("6", &raw, &writing_to(tmp.path())).unwrap();
    let att = &msg.attachments()[0];
    let now = chrono::Utc::now().format("%Y/%m/").to_string();
    assert!(att.to_record().filepath.starts_with(&now));
    assert_eq!(att.data, b"GIF89a\x01\x00\x01\x00\x00\x00\x00,");

    // The id does not depend on when the message was decoded
    let again = decode_raw("6", &raw, &DecodeConfig::default()).unwrap();
    assert_eq!(again.attachments()[0].id, att.id);
}

#[test]
fn test_unwritable_base_dir_is_fatal() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let blocker = tmp.child("blocker");
    blocker.write_str("not a directory").unwrap();

    let err = decode_raw(
        "1",
        &read_fixture("simple_attachment.eml"),
        &writing_to(blocker.path()),
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::DirectoryNotWritable(_)));
}
