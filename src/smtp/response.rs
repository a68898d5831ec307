//! SMTP reply handling.

/// A reply sent to the client, as a code plus human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    pub code: &'static str,
    pub message: String,
}

impl SmtpResponse {
    pub fn new(code: &'static str, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    /// The connection greeting (220).
    pub fn greeting() -> Self {
        Self::new("220", "Welcome to mailsink")
    }

    /// Reply to HELO/EHLO (250).
    pub fn hello() -> Self {
        Self::new("250", "Hello. Pleased to meet you")
    }

    /// A success reply (250 Ok).
    pub fn ok() -> Self {
        Self::new("250", "Ok")
    }

    /// The DATA intermediate reply (354).
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// The QUIT reply (221).
    pub fn goodbye() -> Self {
        Self::new("221", "Bye")
    }

    /// Format the reply for the wire, terminated with CRLF.
    pub fn format(&self) -> String {
        format!("{} {}\r\n", self.code, self.message)
    }

    /// Whether this is a success reply (2xx).
    pub fn is_success(&self) -> bool {
        self.code.starts_with('2')
    }
}
