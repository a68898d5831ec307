//! Mail data model: headers, MIME message trees, attachments, and the
//! parsed mail item handed to receivers.

pub mod attachment;
pub mod header;
pub mod item;
pub mod part;
pub mod sanitize;
pub mod validation;

use thiserror::Error;

pub use attachment::{Attachment, AttachmentHeader};
pub use header::HeaderSet;
pub use item::MailItem;
pub use part::MessagePart;
pub use sanitize::{HtmlScrubber, XssSanitizer};
pub use validation::{EmailComponents, EmailValidator, MailboxValidator};

/// Errors produced while parsing a DATA payload into headers and message
/// parts.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A header line had no `:` separator, or a part had no header block.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    /// A `multipart/*` content type carried no usable boundary parameter.
    #[error("content type '{0}' has no boundary parameter")]
    MissingBoundary(String),

    /// Parsing a nested message part failed.
    #[error("problem parsing part with content type '{content_type}'")]
    Part {
        content_type: String,
        #[source]
        source: Box<ParseError>,
    },
}
