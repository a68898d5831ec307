//! File and inline attachments recovered from message parts.

use serde::Serialize;

use crate::mail::part::MessagePart;

/// Header metadata describing one attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentHeader {
    pub content_type: String,
    pub mime_version: String,
    pub content_transfer_encoding: String,
    pub content_disposition: String,
    pub file_name: String,
}

impl AttachmentHeader {
    /// Collect attachment headers from a message part. The file name comes
    /// from the `Content-Disposition` `filename` parameter.
    pub fn from_part(part: &MessagePart) -> Self {
        AttachmentHeader {
            content_type: part.header("Content-Type").to_string(),
            mime_version: part.header("MIME-Version").to_string(),
            content_transfer_encoding: part.header("Content-Transfer-Encoding").to_string(),
            content_disposition: part.content_disposition().to_string(),
            file_name: part.filename_from_disposition(),
        }
    }
}

/// An attachment as stored on a mail item. `contents` keeps the raw body
/// text of the source part, typically still base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Assigned by storage when the owning mail item is persisted.
    pub id: String,
    pub mail_id: String,
    pub headers: AttachmentHeader,
    pub contents: String,
}

impl Attachment {
    pub fn new(headers: AttachmentHeader, contents: String) -> Self {
        Attachment {
            id: String::new(),
            mail_id: String::new(),
            headers,
            contents,
        }
    }

    /// Build an attachment directly from a message part.
    pub fn from_part(part: &MessagePart) -> Self {
        Attachment::new(AttachmentHeader::from_part(part), part.body().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_from_part() {
        let part = MessagePart::parse(
            "Content-Type: application/pdf;name=\"file.pdf\"\r\nMIME-Version: 1.0\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: attachment;filename=\"file.pdf\"\r\n\r\nabcd=",
        )
        .unwrap();

        let attachment = Attachment::from_part(&part);

        assert_eq!(attachment.headers.file_name, "file.pdf");
        assert_eq!(attachment.headers.content_transfer_encoding, "base64");
        assert!(attachment.headers.content_disposition.contains("attachment"));
        assert_eq!(attachment.contents, "abcd=");
        assert!(attachment.id.is_empty());
    }

    #[test]
    fn test_inline_part_has_no_file_name() {
        let part = MessagePart::parse(
            "Content-Type: image/jpeg;name=\"logo.jpg\"\r\nContent-Transfer-Encoding: base64\r\nContent-ID: <logo.png>\r\n\r\nimagedata=",
        )
        .unwrap();

        let attachment = Attachment::from_part(&part);

        assert_eq!(attachment.headers.file_name, "");
        assert_eq!(attachment.headers.content_type, "image/jpeg;name=\"logo.jpg\"");
        assert_eq!(attachment.contents, "imagedata=");
    }
}
