//! Error types for the SMTP server.

use thiserror::Error;

use crate::mail::ParseError;
use crate::smtp::response::SmtpResponse;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command {0}")]
    InvalidCommand(String),

    #[error("{0} command format is invalid")]
    InvalidCommandFormat(String),

    #[error("the provided email address '{0}' is invalid")]
    InvalidEmail(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("transaction failed")]
    TransactionFailed,

    #[error("session exceeded the command timeout")]
    Timeout,

    #[error("connection closed by client")]
    ConnectionClosed,

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl SmtpError {
    /// The reply to send for this error, when one should be sent at all.
    /// Timeouts and transport failures close the connection silently.
    pub fn reply(&self) -> Option<SmtpResponse> {
        match self {
            SmtpError::InvalidCommand(_) => Some(SmtpResponse::new(
                "500",
                "Syntax error, command unrecognized",
            )),
            SmtpError::InvalidCommandFormat(command) => Some(SmtpResponse::new(
                "501",
                &format!("{command} command format is invalid"),
            )),
            SmtpError::InvalidEmail(address) => Some(SmtpResponse::new(
                "550",
                &format!("Invalid email address {address}"),
            )),
            SmtpError::Parse(_) | SmtpError::TransactionFailed => {
                Some(SmtpResponse::new("554", "Transaction failed"))
            }
            _ => None,
        }
    }

    /// Whether this error ends the session instead of just the command.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SmtpError::Io(_)
                | SmtpError::Timeout
                | SmtpError::ConnectionClosed
                | SmtpError::Tls(_)
                | SmtpError::PoolClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes_match_error_kinds() {
        assert_eq!(
            SmtpError::InvalidCommand("BOGUS".into()).reply().unwrap().code,
            "500"
        );
        assert_eq!(
            SmtpError::InvalidCommandFormat("HELO".into())
                .reply()
                .unwrap()
                .code,
            "501"
        );
        assert_eq!(
            SmtpError::InvalidEmail("from@".into()).reply().unwrap().code,
            "550"
        );
        assert_eq!(SmtpError::TransactionFailed.reply().unwrap().code, "554");
        assert_eq!(
            SmtpError::Parse(ParseError::InvalidHeader("x".into()))
                .reply()
                .unwrap()
                .code,
            "554"
        );
    }

    #[test]
    fn test_silent_errors_have_no_reply() {
        assert!(SmtpError::Timeout.reply().is_none());
        assert!(SmtpError::ConnectionClosed.reply().is_none());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SmtpError::Timeout.is_fatal());
        assert!(SmtpError::ConnectionClosed.is_fatal());
        assert!(!SmtpError::InvalidEmail("x".into()).is_fatal());
        assert!(!SmtpError::TransactionFailed.is_fatal());
    }
}
