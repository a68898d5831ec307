//! Classification of inbound lines into SMTP commands, plus the helpers
//! that check command shape and pull out argument values.

use std::fmt;

use crate::smtp::error::SmtpError;

/// The SMTP verbs this server understands. Anything else classifies as
/// `Unknown` and draws a generic error without ending the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo,
    Ehlo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
    Unknown,
}

impl SmtpCommand {
    /// Classify a line by its first whitespace-delimited token,
    /// case-insensitively.
    pub fn from_line(line: &str) -> Self {
        let token = line
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match token.as_str() {
            "HELO" => SmtpCommand::Helo,
            "EHLO" => SmtpCommand::Ehlo,
            "MAIL" => SmtpCommand::Mail,
            "RCPT" => SmtpCommand::Rcpt,
            "DATA" => SmtpCommand::Data,
            "RSET" => SmtpCommand::Rset,
            "NOOP" => SmtpCommand::Noop,
            "QUIT" => SmtpCommand::Quit,
            _ => SmtpCommand::Unknown,
        }
    }
}

impl fmt::Display for SmtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmtpCommand::Helo => "HELO",
            SmtpCommand::Ehlo => "EHLO",
            SmtpCommand::Mail => "MAIL",
            SmtpCommand::Rcpt => "RCPT",
            SmtpCommand::Data => "DATA",
            SmtpCommand::Rset => "RSET",
            SmtpCommand::Noop => "NOOP",
            SmtpCommand::Quit => "QUIT",
            SmtpCommand::Unknown => "UNKNOWN",
        };

        write!(f, "{name}")
    }
}

/// Check that a line begins with the expected command phrase,
/// case-insensitively and ignoring leading whitespace.
pub fn is_valid_command(line: &str, expected: &str) -> Result<(), SmtpError> {
    let line = line.trim_start();

    match line.get(..expected.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(expected) => Ok(()),
        _ => Err(SmtpError::InvalidCommand(expected.to_string())),
    }
}

/// Split a command line on the first occurrence of `delimiter` and return
/// the trimmed right-hand side. A missing or empty value is a format error.
pub fn get_command_value(line: &str, expected: &str, delimiter: char) -> Result<String, SmtpError> {
    let value = line
        .split_once(delimiter)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();

    if value.is_empty() {
        return Err(SmtpError::InvalidCommandFormat(expected.to_string()));
    }

    Ok(value.to_string())
}
