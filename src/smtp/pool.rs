//! A bounded pool of reusable SMTP workers.
//!
//! The pool is the admission-control point: checking out a worker blocks
//! until one is idle, which in turn blocks the accept loop and lets the OS
//! socket backlog absorb excess clients.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::mail::item::MailItem;
use crate::mail::{EmailValidator, XssSanitizer};
use crate::smtp::connection::Connection;
use crate::smtp::error::SmtpError;
use crate::smtp::worker::{SmtpWorker, COMMAND_TIMEOUT};

pub struct ServerPool {
    idle: Receiver<SmtpWorker>,
    capacity: usize,
}

impl ServerPool {
    /// Create a pool of `max_workers` workers (at least one) sharing the
    /// given validator and sanitizer.
    pub fn new(
        max_workers: usize,
        validator: Arc<dyn EmailValidator>,
        sanitizer: Arc<dyn XssSanitizer>,
    ) -> Self {
        Self::with_session_timeout(max_workers, validator, sanitizer, COMMAND_TIMEOUT)
    }

    /// Like [`ServerPool::new`] with an explicit per-session budget.
    pub fn with_session_timeout(
        max_workers: usize,
        validator: Arc<dyn EmailValidator>,
        sanitizer: Arc<dyn XssSanitizer>,
        timeout: Duration,
    ) -> Self {
        let capacity = max_workers.max(1);
        let (rejoin, idle): (Sender<SmtpWorker>, Receiver<SmtpWorker>) = mpsc::channel();

        for worker_id in 1..=capacity {
            let worker = SmtpWorker::new(
                worker_id,
                rejoin.clone(),
                Arc::clone(&validator),
                Arc::clone(&sanitizer),
                timeout,
            );

            // The receiver is held right here, so this send cannot fail.
            let _ = rejoin.send(worker);
        }

        info!("worker pool ready with {capacity} worker(s)");
        ServerPool { idle, capacity }
    }

    /// Check out the next idle worker, blocking until one rejoins if all
    /// are busy, and prepare it for the given connection.
    pub fn next(
        &self,
        conn: Connection,
        mail_out: SyncSender<MailItem>,
    ) -> Result<SmtpWorker, SmtpError> {
        let mut worker = self.idle.recv().map_err(|_| SmtpError::PoolClosed)?;
        worker.prepare(conn, mail_out);
        Ok(worker)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
