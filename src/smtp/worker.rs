//! The per-session SMTP worker: one state machine driving one connection.

use std::mem;
use std::sync::mpsc::{Sender, SyncSender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::mail::header::{current_date_time, parse_date_time, HeaderSet};
use crate::mail::item::{MailItem, NO_SUBJECT};
use crate::mail::part::{parse_media_type, MessagePart};
use crate::mail::{EmailValidator, XssSanitizer};
use crate::smtp::command::{get_command_value, is_valid_command, SmtpCommand};
use crate::smtp::connection::{Connection, SmtpStream};
use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;

/// Budget for a whole session, measured from its first accepted line.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(90);

/// Observable lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Working,
    Done,
    Error,
}

/// Protocol position within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    HeloWait,
    MailWait,
    RcptWait,
}

/// A reusable worker. Created once per pool slot, prepared with a
/// connection for each session, and returned to the pool afterwards.
pub struct SmtpWorker {
    worker_id: usize,
    state: WorkerState,
    validator: Arc<dyn EmailValidator>,
    sanitizer: Arc<dyn XssSanitizer>,
    rejoin: Sender<SmtpWorker>,
    timeout: Duration,
    conn: Option<Connection>,
    mail_out: Option<SyncSender<MailItem>>,
}

impl SmtpWorker {
    pub(crate) fn new(
        worker_id: usize,
        rejoin: Sender<SmtpWorker>,
        validator: Arc<dyn EmailValidator>,
        sanitizer: Arc<dyn XssSanitizer>,
        timeout: Duration,
    ) -> Self {
        SmtpWorker {
            worker_id,
            state: WorkerState::Idle,
            validator,
            sanitizer,
            rejoin,
            timeout,
            conn: None,
            mail_out: None,
        }
    }

    pub fn id(&self) -> usize {
        self.worker_id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Hand the worker a connection and the channel its finished mail goes
    /// to. Called by the pool when the worker is checked out.
    pub(crate) fn prepare(&mut self, conn: Connection, mail_out: SyncSender<MailItem>) {
        self.state = WorkerState::Working;
        self.conn = Some(conn);
        self.mail_out = Some(mail_out);
    }

    /// Run the session to completion, deliver any finished mail, close the
    /// connection, and rejoin the pool. Consumes the worker; the pool's
    /// queue hands it back out for the next session.
    pub fn work(mut self) {
        if let (Some(conn), Some(mail_out)) = (self.conn.take(), self.mail_out.take()) {
            let mut session = Session {
                stream: SmtpStream::new(conn),
                validator: self.validator.clone(),
                sanitizer: self.sanitizer.clone(),
                worker_id: self.worker_id,
                state: SessionState::HeloWait,
                mail: MailItem::new(),
                completed: Vec::new(),
            };

            let result = session.run(self.timeout);
            session.stream.close();

            match result {
                Ok(items) => {
                    self.state = WorkerState::Done;

                    for item in items {
                        if mail_out.send(item).is_err() {
                            warn!(worker = self.worker_id, "mail channel closed, dropping item");
                            break;
                        }
                    }
                }
                Err(err) => {
                    self.state = WorkerState::Error;
                    debug!(worker = self.worker_id, "session ended with error: {err}");
                }
            }
        }

        self.state = WorkerState::Idle;

        let rejoin = self.rejoin.clone();
        if rejoin.send(self).is_err() {
            debug!("worker pool gone, worker retiring");
        }
    }
}

/// Everything one session needs, separated from the worker so the state
/// machine can borrow freely.
struct Session {
    stream: SmtpStream,
    validator: Arc<dyn EmailValidator>,
    sanitizer: Arc<dyn XssSanitizer>,
    worker_id: usize,
    state: SessionState,
    mail: MailItem,
    completed: Vec<MailItem>,
}

impl Session {
    /// Drive the command loop. Returns the mail items completed during the
    /// session on a clean QUIT; any fatal error discards them all.
    fn run(&mut self, timeout: Duration) -> Result<Vec<MailItem>, SmtpError> {
        self.stream.send(&SmtpResponse::greeting())?;

        let deadline = Instant::now() + timeout;

        loop {
            let line = self.stream.read_line(deadline)?;

            if Instant::now() > deadline {
                return Err(SmtpError::Timeout);
            }

            let command = SmtpCommand::from_line(&line);

            if command == SmtpCommand::Quit {
                self.stream.send(&SmtpResponse::goodbye())?;
                info!(worker = self.worker_id, "closing connection");
                return Ok(mem::take(&mut self.completed));
            }

            if let Err(err) = self.execute(command, line.trim(), deadline) {
                if err.is_fatal() {
                    return Err(err);
                }

                debug!(worker = self.worker_id, "problem executing {command}: {err}");
                if let Some(reply) = err.reply() {
                    self.stream.send(&reply)?;
                }
            }
        }
    }

    fn execute(
        &mut self,
        command: SmtpCommand,
        line: &str,
        deadline: Instant,
    ) -> Result<(), SmtpError> {
        match command {
            SmtpCommand::Helo | SmtpCommand::Ehlo => self.process_helo(line),
            SmtpCommand::Mail => self.process_mail(line),
            SmtpCommand::Rcpt => self.process_rcpt(line),
            SmtpCommand::Data => self.process_data(line, deadline),
            SmtpCommand::Rset => self.process_rset(),
            SmtpCommand::Noop => self.stream.send(&SmtpResponse::ok()),
            SmtpCommand::Quit => Ok(()),
            SmtpCommand::Unknown => Err(SmtpError::InvalidCommand(
                line.split_whitespace().next().unwrap_or_default().to_string(),
            )),
        }
    }

    /// HELO/EHLO requires a domain argument and resets any transaction in
    /// progress.
    fn process_helo(&mut self, line: &str) -> Result<(), SmtpError> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();

        let domain = parts
            .next()
            .ok_or_else(|| SmtpError::InvalidCommandFormat(verb.to_ascii_uppercase()))?;

        debug!(worker = self.worker_id, "client says hello from {domain}");

        self.mail = MailItem::new();
        self.state = SessionState::MailWait;
        self.stream.send(&SmtpResponse::hello())
    }

    fn process_mail(&mut self, line: &str) -> Result<(), SmtpError> {
        if self.state != SessionState::MailWait {
            return Err(SmtpError::InvalidCommand("MAIL FROM".to_string()));
        }

        is_valid_command(line, "MAIL FROM")?;
        let value = get_command_value(line, "MAIL FROM", ':')?;

        let components = self
            .validator
            .components(&value)
            .ok_or_else(|| SmtpError::InvalidEmail(value.clone()))?;

        let from = self.sanitizer.sanitize(&components.address());
        if !self.validator.is_valid(&from) {
            return Err(SmtpError::InvalidEmail(from));
        }

        info!(worker = self.worker_id, "mail from {from}");
        self.mail.from_address = from;
        self.state = SessionState::RcptWait;
        self.stream.send(&SmtpResponse::ok())
    }

    fn process_rcpt(&mut self, line: &str) -> Result<(), SmtpError> {
        if self.state != SessionState::RcptWait {
            return Err(SmtpError::InvalidCommand("RCPT TO".to_string()));
        }

        is_valid_command(line, "RCPT TO")?;
        let value = get_command_value(line, "RCPT TO", ':')?;

        let components = self
            .validator
            .components(&value)
            .ok_or_else(|| SmtpError::InvalidEmail(value.clone()))?;

        let to = self.sanitizer.sanitize(&components.address());
        if !self.validator.is_valid(&to) {
            return Err(SmtpError::InvalidEmail(to));
        }

        self.mail.to_addresses.push(to);
        self.stream.send(&SmtpResponse::ok())
    }

    /// DATA: announce the terminator, read the payload, and parse it into
    /// the current mail item. A parse failure aborts only this mail; the
    /// session stays usable for another transaction.
    fn process_data(&mut self, line: &str, deadline: Instant) -> Result<(), SmtpError> {
        if self.state != SessionState::RcptWait {
            return Err(SmtpError::InvalidCommand("DATA".to_string()));
        }

        is_valid_command(line, "DATA")?;
        self.stream.send(&SmtpResponse::data_start())?;

        let contents = self.stream.read_data_block(deadline)?;

        match self.build_mail(&contents) {
            Ok(()) => {
                self.stream.send(&SmtpResponse::ok())?;
                let finished = mem::replace(&mut self.mail, MailItem::new());
                self.completed.push(finished);
                self.state = SessionState::MailWait;
                Ok(())
            }
            Err(err) => {
                error!(worker = self.worker_id, "problem parsing message contents: {err}");
                self.mail = MailItem::new();
                self.state = SessionState::MailWait;
                Err(err)
            }
        }
    }

    /// RSET discards the in-progress mail item. Mails already completed in
    /// this session are unaffected.
    fn process_rset(&mut self) -> Result<(), SmtpError> {
        self.mail = MailItem::new();
        self.state = SessionState::MailWait;
        self.stream.send(&SmtpResponse::ok())
    }

    /// Parse one DATA payload into the current mail item.
    fn build_mail(&mut self, contents: &str) -> Result<(), SmtpError> {
        let header_block = contents
            .split_once("\r\n\r\n")
            .map_or(contents, |(headers, _)| headers);
        let headers = HeaderSet::parse(header_block)?;

        let media = parse_media_type(headers.value("Content-Type"));
        self.apply_header_metadata(&headers);

        // Simple single-part mails skip tree building entirely. A missing
        // content type defaults to text/plain.
        if media.essence.is_empty() || media.essence.starts_with("text/plain") {
            self.mail.text_body = self.simple_body(contents);
        } else if media.essence.starts_with("text/html") {
            self.mail.html_body = self.simple_body(contents);
        } else {
            let message = MessagePart::parse(contents)?;

            if message.children().is_empty() {
                error!(worker = self.worker_id, "message tree has no parts");
                return Err(SmtpError::TransactionFailed);
            }

            let children = message.children().to_vec();
            for part in &children {
                self.mail.record_message_part(part);
            }

            self.mail.message = message;
        }

        self.mail.text_body = self.sanitizer.sanitize(&self.mail.text_body);
        self.mail.html_body = self.sanitizer.sanitize(&self.mail.html_body);
        self.mail.choose_body();

        Ok(())
    }

    /// Everything after the first blank line, or nothing for a
    /// headers-only mail.
    fn simple_body(&self, contents: &str) -> String {
        contents
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default()
    }

    fn apply_header_metadata(&mut self, headers: &HeaderSet) {
        let subject = self.sanitizer.sanitize(headers.value("Subject"));
        self.mail.subject = if subject.trim().is_empty() {
            NO_SUBJECT.to_string()
        } else {
            subject
        };

        self.mail.date_sent =
            parse_date_time(headers.value("Date")).unwrap_or_else(current_date_time);

        let content_type = headers.value("Content-Type");
        self.mail.content_type = self.sanitizer.sanitize(content_type);
        self.mail.boundary = parse_media_type(content_type).boundary.unwrap_or_default();

        self.mail.mime_version = headers.value("MIME-Version").to_string();

        let x_mailer = headers.value("X-Mailer");
        if !x_mailer.is_empty() {
            self.mail.x_mailer = x_mailer.to_string();
        }
    }
}
