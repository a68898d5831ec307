//! # mailsink
//!
//! mailsink is an SMTP sink: a TCP server that accepts mail from any
//! client, runs the server side of the SMTP conversation, parses the
//! submitted message (including nested multipart MIME), and hands the
//! resulting mail item to registered receivers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::net::TcpListener;
//! use std::sync::Arc;
//!
//! use mailsink::{
//!     DatabaseReceiver, Dispatcher, HtmlScrubber, InMemoryStorage, MailboxValidator,
//!     ServerPool, SmtpListener,
//! };
//!
//! let listener = SmtpListener::from_tcp(TcpListener::bind("127.0.0.1:2500").unwrap());
//! let pool = ServerPool::new(10, Arc::new(MailboxValidator), Arc::new(HtmlScrubber));
//!
//! let storage = Arc::new(InMemoryStorage::new());
//! let mut dispatcher = Dispatcher::new(listener, pool);
//! dispatcher.add_receiver(Arc::new(DatabaseReceiver::new(storage)));
//!
//! let handle = dispatcher.start().unwrap();
//!
//! // ... accept mail until it is time to stop ...
//!
//! handle.shutdown();
//! ```
//!
//! ## Supported SMTP commands
//!
//! - `HELO` / `EHLO` - identify the client
//! - `MAIL FROM` - specify the sender address
//! - `RCPT TO` - specify a recipient (repeatable)
//! - `DATA` - send the message content
//! - `RSET` - abandon the current transaction
//! - `NOOP` - do nothing
//! - `QUIT` - close the connection and deliver completed mail
//!
//! ## Notes
//!
//! - Any sender is accepted; there is no authentication or relay.
//! - Sessions may submit several mails before QUIT.
//! - With `certFile`/`keyFile` configured the listener speaks implicit TLS.
//! - Bodies keep their on-the-wire form; transfer encodings are not
//!   decoded.

pub mod config;
pub mod mail;
pub mod receiver;
pub mod smtp;
pub mod storage;

pub use config::{ConfigError, Configuration};
pub use mail::{
    Attachment, AttachmentHeader, EmailComponents, EmailValidator, HeaderSet, HtmlScrubber,
    MailItem, MailboxValidator, MessagePart, ParseError, XssSanitizer,
};
pub use receiver::{DatabaseReceiver, MailItemReceiver};
pub use smtp::{
    Dispatcher, DispatcherHandle, ServerPool, SmtpCommand, SmtpError, SmtpListener, SmtpResponse,
    SmtpWorker, WorkerState, COMMAND_TIMEOUT,
};
pub use storage::{InMemoryStorage, MailSearch, Storage, StorageError, StorageType};
