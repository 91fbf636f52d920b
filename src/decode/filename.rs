//! Attachment naming: the header fallback chain and extension inference.

use crate::parser::header::trim_angle_brackets;
use crate::parser::part::MimePart;

/// Known content types and the extension files of that type usually carry.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/ics", "ics"),
    ("application/illustrator", "ai"),
    ("application/java-archive", "jar"),
    ("application/java-vm", "class"),
    ("application/javascript", "js"),
    ("application/json", "json"),
    ("application/msword", "doc"),
    ("application/octet-stream", "bin"),
    ("application/pdf", "pdf"),
    ("application/pkcs7-signature", "p7s"),
    ("application/pgp-signature", "asc"),
    ("application/photoshop", "psd"),
    ("application/postscript", "ps"),
    ("application/rtf", "rtf"),
    ("application/sql", "sql"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/vnd.ms-publisher", "pub"),
    ("application/vnd.ms-word", "doc"),
    ("application/vnd.ms-xpsdocument", "xps"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.oasis.opendocument.text", "odt"),
    ("application/x-compress", "zip"),
    ("application/x-gzip", "gz"),
    ("application/x-httpd-php", "php"),
    ("application/x-font-ttf", "ttf"),
    ("application/x-javascript", "js"),
    ("application/x-msword", "doc"),
    ("application/x-php", "php"),
    ("application/x-pkcs7-signature", "p7s"),
    ("application/x-shockwave-flash", "swf"),
    ("application/x-zip-compressed", "zip"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("audio/mp4", "mp4a"),
    ("audio/mpeg", "mpga"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("image/bmp", "bmp"),
    ("image/gif", "gif"),
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpeg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/tiff", "tiff"),
    ("image/vnd.adobe.photoshop", "psd"),
    ("image/x-icon", "ico"),
    ("message/rfc822", "mime"),
    ("text/calendar", "ics"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/tab-separated-values", "tsv"),
    ("text/vcard", "vcard"),
    ("text/x-python", "py"),
    ("text/x-sql", "sql"),
    ("text/x-vcard", "vcard"),
    ("video/h264", "h264"),
    ("video/jpeg", "jpgv"),
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpeg"),
    ("video/ogg", "ogv"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("video/x-flv", "flv"),
    ("video/x-m4v", "m4v"),
    ("video/x-matroska", "mkv"),
    ("video/x-ms-wmv", "wmv"),
    ("video/x-msvideo", "avi"),
];

const FALLBACK_NAME: &str = "noname";
const CALENDAR_NAME: &str = "event.ics";

/// Usual extension for a lowercased content type.
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

/// Append an extension to `filename` when it has none.
///
/// A name counts as having an extension when the text after its last `.` is
/// non-empty. Empty names are left alone. The extension comes from the
/// content type, else from `default`; with neither the name is unchanged.
pub fn add_extension_if_missing(
    filename: &mut String,
    mime_type: Option<&str>,
    default: Option<&str>,
) {
    if filename.is_empty() {
        return;
    }
    if filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| !ext.is_empty())
    {
        return;
    }

    let ext = mime_type.and_then(extension_for).or(default);
    if let Some(ext) = ext.filter(|e| !e.is_empty()) {
        filename.push('.');
        filename.push_str(ext);
    }
}

/// Names found for an attachment part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedName {
    /// `name` parameter from the disposition, else the content type.
    pub name: Option<String>,
    /// Final file name, never empty.
    pub filename: String,
    pub orig_name: Option<String>,
    pub orig_filename: Option<String>,
    pub mime_type: Option<String>,
}

/// Work out an attachment's names from its headers.
///
/// The disposition parameters win over the content-type ones. Without a
/// `filename`, the content id, the attachment id, the last segment of
/// `Content-Location`, `event.ics` for calendar parts and finally `name`
/// are tried before settling on `noname`.
pub fn resolve(part: &MimePart) -> ResolvedName {
    let mime_type = part.content_type();
    let name = part
        .param("content-disposition", "name")
        .or_else(|| part.param("content-type", "name"));
    let orig_filename = part
        .param("content-disposition", "filename")
        .or_else(|| part.param("content-type", "filename"));

    let headers = part.headers();
    let mut filename = orig_filename
        .clone()
        .or_else(|| header_token(headers.get("content-id")))
        .or_else(|| header_token(headers.get("x-attachment-id")))
        .or_else(|| headers.get("content-location").and_then(location_basename))
        .or_else(|| {
            (mime_type.as_deref() == Some("text/calendar")).then(|| CALENDAR_NAME.to_string())
        })
        .or_else(|| name.clone())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    add_extension_if_missing(&mut filename, mime_type.as_deref(), None);

    ResolvedName {
        orig_name: name.clone(),
        name,
        filename,
        orig_filename,
        mime_type,
    }
}

fn header_token(value: Option<&str>) -> Option<String> {
    value
        .map(trim_angle_brackets)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Last path segment of a URL or path, ignoring query and fragment.
fn location_basename(location: &str) -> Option<String> {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches(['/', '\\']);
    path.rsplit(['/', '\\'])
        .next()
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::header::Headers;

    fn part(headers: &[(&str, &str)]) -> MimePart {
        MimePart::new(Headers::from_pairs(headers.iter().copied()), Vec::new())
    }

    #[test]
    fn test_add_extension() {
        let mut name = "report".to_string();
        add_extension_if_missing(&mut name, Some("application/pdf"), None);
        assert_eq!(name, "report.pdf");

        let mut name = "report.pdf".to_string();
        add_extension_if_missing(&mut name, Some("image/png"), None);
        assert_eq!(name, "report.pdf");

        let mut name = "archive".to_string();
        add_extension_if_missing(&mut name, Some("application/x-unknown"), Some("dat"));
        assert_eq!(name, "archive.dat");

        let mut name = "archive".to_string();
        add_extension_if_missing(&mut name, None, None);
        assert_eq!(name, "archive");

        let mut name = String::new();
        add_extension_if_missing(&mut name, Some("application/pdf"), None);
        assert_eq!(name, "");
    }

    #[test]
    fn test_trailing_dot_counts_as_missing() {
        let mut name = "scan.".to_string();
        add_extension_if_missing(&mut name, Some("image/jpeg"), None);
        assert_eq!(name, "scan..jpeg");
    }

    #[test]
    fn test_resolve_prefers_disposition() {
        let p = part(&[
            ("Content-Type", "application/pdf; name=\"ct-name.pdf\""),
            (
                "Content-Disposition",
                "attachment; filename=\"report\"; name=\"disp-name\"",
            ),
        ]);
        let r = resolve(&p);
        assert_eq!(r.filename, "report.pdf");
        assert_eq!(r.name.as_deref(), Some("disp-name"));
        assert_eq!(r.orig_filename.as_deref(), Some("report"));
        assert_eq!(r.mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_resolve_content_type_filename() {
        let p = part(&[("Content-Type", "application/pdf; filename=\"report.pdf\"")]);
        assert_eq!(resolve(&p).filename, "report.pdf");
    }

    #[test]
    fn test_resolve_content_id_fallback() {
        let p = part(&[("Content-Type", "application/x-custom"), ("Content-ID", "<abc123>")]);
        let r = resolve(&p);
        assert_eq!(r.filename, "abc123");
        assert_eq!(r.orig_filename, None);

        let p = part(&[("Content-Type", "image/png"), ("Content-ID", "<logo>")]);
        assert_eq!(resolve(&p).filename, "logo.png");
    }

    #[test]
    fn test_resolve_attachment_id_then_location() {
        let p = part(&[("Content-Type", "image/gif"), ("X-Attachment-Id", " <ii_k1> ")]);
        assert_eq!(resolve(&p).filename, "ii_k1.gif");

        let p = part(&[
            ("Content-Type", "image/jpeg"),
            ("Content-Location", "https://cdn.example.com/img/photo.jpg?size=large"),
        ]);
        assert_eq!(resolve(&p).filename, "photo.jpg");
    }

    #[test]
    fn test_resolve_calendar_name_and_noname() {
        let p = part(&[("Content-Type", "text/calendar; method=REQUEST")]);
        assert_eq!(resolve(&p).filename, "event.ics");

        let p = part(&[("Content-Type", "application/octet-stream; name=\"data\"")]);
        assert_eq!(resolve(&p).filename, "data.bin");

        let p = part(&[("Content-Type", "application/x-unknown")]);
        assert_eq!(resolve(&p).filename, "noname");
    }

    #[test]
    fn test_location_basename() {
        assert_eq!(location_basename("/a/b/c.txt").as_deref(), Some("c.txt"));
        assert_eq!(location_basename("c.txt").as_deref(), Some("c.txt"));
        assert_eq!(location_basename("http://x/dir/").as_deref(), Some("dir"));
        assert_eq!(location_basename("  "), None);
    }
}
