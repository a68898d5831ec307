//! Recursive MIME message tree built from a DATA payload.

use crate::mail::{HeaderSet, ParseError};

/// A parsed media type: the lowercased `type/subtype` essence plus the
/// `boundary` parameter when one is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaType {
    pub essence: String,
    pub boundary: Option<String>,
}

/// Parse a `Content-Type` header value. Parameters other than `boundary`
/// are ignored.
pub fn parse_media_type(value: &str) -> MediaType {
    let mut pieces = value.split(';');
    let essence = pieces.next().unwrap_or("").trim().to_ascii_lowercase();

    let boundary = pieces.find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            Some(val.trim().trim_matches('"').to_string())
        } else {
            None
        }
    });

    MediaType { essence, boundary }
}

/// One node in the MIME tree: a header set, the raw on-the-wire body, and
/// any child parts when the content type is `multipart/*`.
///
/// Bodies are never transfer-decoded; a base64 attachment keeps its base64
/// text. A multipart node retains the full multipart substring as its body
/// so the original bytes stay inspectable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePart {
    headers: HeaderSet,
    body: String,
    children: Vec<MessagePart>,
}

impl MessagePart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message part (and, recursively, its children) from the raw
    /// content of one part: a header block, `CRLF CRLF`, then the body.
    pub fn parse(raw: &str) -> Result<MessagePart, ParseError> {
        let (header_block, body_block) = raw.split_once("\r\n\r\n").ok_or_else(|| {
            ParseError::InvalidHeader(raw.lines().next().unwrap_or_default().to_string())
        })?;

        let headers = HeaderSet::parse(header_block)?;
        let media = parse_media_type(headers.value("Content-Type"));

        let mut part = MessagePart {
            headers,
            body: body_block.to_string(),
            children: Vec::new(),
        };

        if media.essence.starts_with("multipart/") {
            let boundary = media
                .boundary
                .filter(|b| !b.is_empty())
                .ok_or_else(|| ParseError::MissingBoundary(media.essence.clone()))?;

            part.parse_children(body_block, &boundary)?;
        }

        Ok(part)
    }

    fn parse_children(&mut self, body: &str, boundary: &str) -> Result<(), ParseError> {
        for sub_part in split_multipart(body, boundary) {
            let child = MessagePart::parse(sub_part).map_err(|err| ParseError::Part {
                content_type: self.content_type().to_string(),
                source: Box::new(err),
            })?;

            self.children.push(child);
        }

        Ok(())
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// A header value by name, or an empty string when absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers.value(name)
    }

    /// The raw `Content-Type` header value.
    pub fn content_type(&self) -> &str {
        self.header("Content-Type")
    }

    /// The lowercased media type essence, e.g. `text/plain`.
    pub fn media_type(&self) -> String {
        parse_media_type(self.content_type()).essence
    }

    pub fn content_disposition(&self) -> &str {
        self.header("Content-Disposition")
    }

    /// Whether the part's disposition marks it as a file attachment.
    pub fn is_attachment(&self) -> bool {
        self.content_disposition().contains("attachment")
    }

    /// Extract the `filename` parameter from the `Content-Disposition`
    /// header, with surrounding quotes stripped.
    pub fn filename_from_disposition(&self) -> String {
        self.content_disposition()
            .split(';')
            .skip(1)
            .find_map(|param| {
                let (key, value) = param.split_once('=')?;
                if key.trim().eq_ignore_ascii_case("filename") {
                    Some(value.trim().trim_matches('"').to_string())
                } else {
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn children(&self) -> &[MessagePart] {
        &self.children
    }

    #[cfg(test)]
    pub(crate) fn synthetic(headers: &[(&str, &str)], body: &str, children: Vec<MessagePart>) -> Self {
        let block: String = headers
            .iter()
            .map(|(key, value)| format!("{key}: {value}\r\n"))
            .collect();

        MessagePart {
            headers: HeaderSet::parse(&block).unwrap(),
            body: body.to_string(),
            children,
        }
    }
}

/// Split a multipart body into the raw content of each sub-part.
///
/// Sections are delimited by `--boundary` lines; the preamble before the
/// first delimiter and the epilogue after the `--boundary--` terminator are
/// discarded. Empty sections are skipped. A missing terminator ends the
/// split at end of input.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{}", boundary.trim());
    let terminator = format!("{delimiter}--");
    let mut parts = Vec::new();
    let mut remaining = body;
    let mut in_part = false;
    let mut start = 0usize;
    let mut offset = 0usize;

    loop {
        let line_end = remaining.find("\r\n").map_or(remaining.len(), |i| i);
        let line = &remaining[..line_end];
        let trimmed = line.trim_end();

        let is_terminator = trimmed == terminator;
        if trimmed == delimiter || is_terminator {
            if in_part {
                // The CRLF before the delimiter belongs to the delimiter.
                let end = (offset).saturating_sub(2).max(start);
                let content = &body[start..end];
                if !content.trim().is_empty() {
                    parts.push(content);
                }
            }

            if is_terminator {
                return parts;
            }

            in_part = true;
            start = offset + line_end + 2;
        }

        if line_end == remaining.len() {
            break;
        }

        offset += line_end + 2;
        remaining = &remaining[line_end + 2..];
    }

    if in_part && start <= body.len() {
        let content = &body[start..];
        if !content.trim().is_empty() {
            parts.push(content);
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_type_with_boundary() {
        let media = parse_media_type("multipart/mixed; boundary=\"==abcd==\"");

        assert_eq!(media.essence, "multipart/mixed");
        assert_eq!(media.boundary.as_deref(), Some("==abcd=="));
    }

    #[test]
    fn test_parse_media_type_unquoted_boundary() {
        let media = parse_media_type("multipart/alternative; charset=utf-8; boundary=b");

        assert_eq!(media.essence, "multipart/alternative");
        assert_eq!(media.boundary.as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_media_type_plain() {
        let media = parse_media_type("text/plain; charset=\"us-ascii\"");

        assert_eq!(media.essence, "text/plain");
        assert_eq!(media.boundary, None);
    }

    #[test]
    fn test_simple_text_part_is_a_leaf() {
        let raw = "Content-Type: text/plain\r\nMIME-Version: 1.0\r\nSubject: Test...\r\n\r\nThis is a simple text email";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.media_type(), "text/plain");
        assert_eq!(part.body(), "This is a simple text email");
        assert!(part.children().is_empty());
    }

    #[test]
    fn test_simple_html_part_is_a_leaf() {
        let raw = "Content-Type: text/html\r\nMIME-Version: 1.0\r\n\r\n<p>This is a simple text email</p>";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.media_type(), "text/html");
        assert_eq!(part.body(), "<p>This is a simple text email</p>");
    }

    #[test]
    fn test_missing_separator_is_invalid() {
        let result = MessagePart::parse("Content-Type: text/plain\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_multipart_mixed_two_leaves() {
        let raw = "Content-Type: multipart/mixed; boundary=\"abcd\"\r\nMIME-Version: 1.0\r\n\r\n--abcd\r\nContent-Type: text/plain\r\n\r\nThis is the text version\r\n--abcd\r\nContent-Type: text/html\r\n\r\n<p>This is HTML</p>\r\n--abcd--";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.children().len(), 2);
        assert_eq!(part.children()[0].media_type(), "text/plain");
        assert_eq!(part.children()[0].body(), "This is the text version");
        assert_eq!(part.children()[1].media_type(), "text/html");
        assert_eq!(part.children()[1].body(), "<p>This is HTML</p>");
    }

    #[test]
    fn test_multipart_retains_raw_body() {
        let raw = "Content-Type: multipart/mixed; boundary=\"abcd\"\r\n\r\n--abcd\r\nContent-Type: text/plain\r\n\r\nhi\r\n--abcd--";
        let part = MessagePart::parse(raw).unwrap();

        assert!(part.body().contains("--abcd"));
    }

    #[test]
    fn test_multipart_with_preamble() {
        let raw = "Content-Type: multipart/related;\r\n boundary=\"==outer==\"\r\nMIME-Version: 1.0\r\n\r\nThis is a multi-part message in MIME format.\r\n--==outer==\r\nContent-Type: text/plain\r\n\r\nTest message... please ignore.\r\n--==outer==--";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.children().len(), 1);
        assert_eq!(part.children()[0].body(), "Test message... please ignore.");
    }

    #[test]
    fn test_nested_multiparts_recurse() {
        let raw = "Content-Type: multipart/mixed; boundary=\"a\"\r\nMIME-Version: 1.0\r\n\r\n--a\r\nContent-Type: multipart/related; boundary=\"b\"\r\n\r\n--b\r\nContent-Type: multipart/alternative; boundary=\"c\"\r\n\r\n--c\r\nContent-Type: text/plain\r\n\r\nThis is the text version\r\n--c\r\nContent-Type: text/html\r\n\r\n<p>This is HTML</p>\r\n--c--\r\n\r\n--b\r\nContent-Type: image/jpeg;name=\"logo.jpg\"\r\nContent-Transfer-Encoding: base64\r\nContent-ID: <logo.png>\r\n\r\nabcdlkjfldkjflskdjfsl=\r\n\r\n--b--\r\n\r\n--a\r\nContent-Type: application/pdf;name=\"file.pdf\"\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: attachment;filename=\"file.pdf\"\r\n\r\nabcdlkjfsdlkfj=\r\n\r\n--a--";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.media_type(), "multipart/mixed");
        assert_eq!(part.children().len(), 2);

        let related = &part.children()[0];
        assert_eq!(related.media_type(), "multipart/related");
        assert_eq!(related.children().len(), 2);

        let alternative = &related.children()[0];
        assert_eq!(alternative.media_type(), "multipart/alternative");
        assert_eq!(alternative.children().len(), 2);
        assert_eq!(alternative.children()[0].media_type(), "text/plain");
        assert_eq!(alternative.children()[1].media_type(), "text/html");

        let image = &related.children()[1];
        assert_eq!(image.media_type(), "image/jpeg");
        assert!(!image.is_attachment());

        let pdf = &part.children()[1];
        assert_eq!(pdf.media_type(), "application/pdf");
        assert!(pdf.is_attachment());
        assert_eq!(pdf.filename_from_disposition(), "file.pdf");
    }

    #[test]
    fn test_leaf_order_matches_source_order() {
        let raw = "Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n--b\r\nContent-Type: text/plain\r\n\r\nhi\r\n--b\r\nContent-Type: text/html\r\n\r\n<p>hi</p>\r\n--b--";
        let part = MessagePart::parse(raw).unwrap();

        let mut leaves = Vec::new();
        fn walk<'a>(part: &'a MessagePart, leaves: &mut Vec<&'a MessagePart>) {
            if part.children().is_empty() {
                leaves.push(part);
            } else {
                for child in part.children() {
                    walk(child, leaves);
                }
            }
        }
        walk(&part, &mut leaves);

        let types: Vec<String> = leaves.iter().map(|leaf| leaf.media_type()).collect();
        assert_eq!(types, vec!["text/plain", "text/html"]);
    }

    #[test]
    fn test_multipart_without_boundary_is_an_error() {
        let result = MessagePart::parse("Content-Type: multipart/mixed\r\n\r\nbody");
        assert!(matches!(result, Err(ParseError::MissingBoundary(_))));
    }

    #[test]
    fn test_missing_terminator_ends_at_input() {
        let raw = "Content-Type: multipart/mixed; boundary=\"x\"\r\n\r\n--x\r\nContent-Type: text/plain\r\n\r\ntruncated body";
        let part = MessagePart::parse(raw).unwrap();

        assert_eq!(part.children().len(), 1);
        assert_eq!(part.children()[0].body(), "truncated body");
    }

    #[test]
    fn test_bad_sub_part_reports_parent_content_type() {
        let raw = "Content-Type: multipart/mixed; boundary=\"x\"\r\n\r\n--x\r\nno colon here\r\n--x--";
        let err = MessagePart::parse(raw).unwrap_err();

        match err {
            ParseError::Part { content_type, .. } => {
                assert!(content_type.contains("multipart/mixed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_filename_without_quotes() {
        let part = MessagePart::parse(
            "Content-Type: application/pdf\r\nContent-Disposition: attachment; filename=report.pdf\r\n\r\nabcd=",
        )
        .unwrap();

        assert_eq!(part.filename_from_disposition(), "report.pdf");
    }

    #[test]
    fn test_filename_missing_returns_empty() {
        let part = MessagePart::parse(
            "Content-Type: application/pdf\r\nContent-Disposition: attachment\r\n\r\nabcd=",
        )
        .unwrap();

        assert_eq!(part.filename_from_disposition(), "");
    }
}
