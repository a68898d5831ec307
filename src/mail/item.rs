//! The parsed mail item produced by a completed SMTP transaction.

use serde::Serialize;
use uuid::Uuid;

use crate::mail::attachment::Attachment;
use crate::mail::part::MessagePart;

/// Default `X-Mailer` value stamped on items whose mail carries none.
pub const DEFAULT_X_MAILER: &str = "mailsink";

/// Subject recorded when a mail has no usable `Subject` header.
pub const NO_SUBJECT: &str = "(No Subject)";

/// A fully parsed mail item. Constructed empty when a transaction begins,
/// populated by the worker during DATA processing, then handed unchanged to
/// every receiver.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
    pub id: String,
    pub date_sent: String,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub subject: String,
    #[serde(rename = "xmailer")]
    pub x_mailer: String,
    pub mime_version: String,
    pub body: String,
    pub content_type: String,
    pub boundary: String,
    pub attachments: Vec<Attachment>,
    pub inline_attachments: Vec<Attachment>,
    pub text_body: String,
    pub html_body: String,

    /// The full MIME tree, kept for inspection. Empty for simple mails
    /// handled without tree building.
    #[serde(skip)]
    pub message: MessagePart,
}

impl MailItem {
    /// Create an empty item with a freshly generated 36-character id. Ids
    /// are assigned up front because receivers may observe items in any
    /// order once they leave the worker.
    pub fn new() -> Self {
        MailItem {
            id: Uuid::new_v4().to_string(),
            x_mailer: DEFAULT_X_MAILER.to_string(),
            ..MailItem::default()
        }
    }

    /// Walk one message part, routing its content into the right slot:
    /// the first non-attachment `text/plain` part becomes the text body,
    /// the first non-attachment `text/html` part becomes the HTML body,
    /// `multipart/*` parts are descended into, and everything else becomes
    /// a file or inline attachment depending on its disposition.
    pub fn record_message_part(&mut self, part: &MessagePart) {
        let media_type = part.media_type();

        if media_type.starts_with("text/plain") && !part.is_attachment() && self.text_body.is_empty()
        {
            self.text_body = part.body().to_string();
        } else if media_type.starts_with("text/html")
            && !part.is_attachment()
            && self.html_body.is_empty()
        {
            self.html_body = part.body().to_string();
        } else if media_type.starts_with("multipart/") {
            for child in part.children() {
                self.record_message_part(child);
            }
        } else {
            let attachment = Attachment::from_part(part);

            if part.is_attachment() {
                self.attachments.push(attachment);
            } else {
                self.inline_attachments.push(attachment);
            }
        }
    }

    /// Pick the primary body: HTML when present, text otherwise.
    pub fn choose_body(&mut self) {
        self.body = if self.html_body.is_empty() {
            self.text_body.clone()
        } else {
            self.html_body.clone()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_has_unique_36_char_id() {
        let first = MailItem::new();
        let second = MailItem::new();

        assert_eq!(first.id.len(), 36);
        assert_ne!(first.id, second.id);
        assert_eq!(first.x_mailer, DEFAULT_X_MAILER);
        assert!(first.to_addresses.is_empty());
        assert!(first.attachments.is_empty());
    }

    #[test]
    fn test_record_text_part_fills_text_body_once() {
        let mut item = MailItem::new();
        let first = MessagePart::synthetic(&[("Content-Type", "text/plain")], "first", vec![]);
        let second = MessagePart::synthetic(&[("Content-Type", "text/plain")], "second", vec![]);

        item.record_message_part(&first);
        item.record_message_part(&second);

        assert_eq!(item.text_body, "first");
        // The second text part is no longer a body candidate.
        assert_eq!(item.inline_attachments.len(), 1);
        assert_eq!(item.inline_attachments[0].contents, "second");
    }

    #[test]
    fn test_record_descends_into_multipart() {
        let mut item = MailItem::new();
        let tree = MessagePart::synthetic(
            &[("Content-Type", "multipart/alternative; boundary=\"b\"")],
            "",
            vec![
                MessagePart::synthetic(&[("Content-Type", "text/plain")], "hi", vec![]),
                MessagePart::synthetic(&[("Content-Type", "text/html")], "<p>hi</p>", vec![]),
            ],
        );

        item.record_message_part(&tree);
        item.choose_body();

        assert_eq!(item.text_body, "hi");
        assert_eq!(item.html_body, "<p>hi</p>");
        assert_eq!(item.body, "<p>hi</p>");
    }

    #[test]
    fn test_attachment_disposition_routes_to_attachments() {
        let mut item = MailItem::new();
        let part = MessagePart::synthetic(
            &[
                ("Content-Type", "text/plain"),
                ("Content-Disposition", "attachment; filename=\"notes.txt\""),
            ],
            "some notes",
            vec![],
        );

        item.record_message_part(&part);

        assert!(item.text_body.is_empty());
        assert_eq!(item.attachments.len(), 1);
        assert_eq!(item.attachments[0].headers.file_name, "notes.txt");
    }

    #[test]
    fn test_non_body_part_without_disposition_is_inline() {
        let mut item = MailItem::new();
        let part = MessagePart::synthetic(
            &[("Content-Type", "image/png"), ("Content-ID", "<logo>")],
            "pngdata=",
            vec![],
        );

        item.record_message_part(&part);

        assert!(item.attachments.is_empty());
        assert_eq!(item.inline_attachments.len(), 1);
    }

    #[test]
    fn test_choose_body_prefers_html() {
        let mut item = MailItem::new();
        item.text_body = "text".to_string();
        item.html_body = "<p>html</p>".to_string();
        item.choose_body();
        assert_eq!(item.body, "<p>html</p>");

        let mut text_only = MailItem::new();
        text_only.text_body = "text".to_string();
        text_only.choose_body();
        assert_eq!(text_only.body, "text");
    }
}
