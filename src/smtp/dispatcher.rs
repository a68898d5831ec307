//! Wiring between the listener, the worker pool, and mail receivers.
//!
//! The dispatcher owns two long-lived threads: an accept loop that checks
//! workers out of the pool for each connection, and a fan-out loop that
//! takes finished mail off a bounded channel and hands each item to every
//! registered receiver. It never parses SMTP itself.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::mail::item::MailItem;
use crate::receiver::MailItemReceiver;
use crate::smtp::error::SmtpError;
use crate::smtp::listener::SmtpListener;
use crate::smtp::pool::ServerPool;

/// Buffered mail channel size, chosen to absorb delivery bursts while
/// receivers catch up.
pub const MAIL_CHANNEL_CAPACITY: usize = 1000;

pub struct Dispatcher {
    listener: SmtpListener,
    pool: ServerPool,
    receivers: Vec<Arc<dyn MailItemReceiver>>,
}

impl Dispatcher {
    pub fn new(listener: SmtpListener, pool: ServerPool) -> Self {
        Dispatcher {
            listener,
            pool,
            receivers: Vec::new(),
        }
    }

    /// Subscribe a receiver to every mail item the server completes.
    pub fn add_receiver(&mut self, receiver: Arc<dyn MailItemReceiver>) {
        self.receivers.push(receiver);
    }

    /// Start the accept and fan-out threads and return a handle used to
    /// shut both down.
    pub fn start(self) -> Result<DispatcherHandle, SmtpError> {
        let addr = self.listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let (mail_tx, mail_rx) = mpsc::sync_channel::<MailItem>(MAIL_CHANNEL_CAPACITY);

        let receivers = self.receivers;
        let fanout = thread::spawn(move || fan_out_loop(mail_rx, receivers));

        let listener = self.listener;
        let pool = self.pool;
        let accept_running = Arc::clone(&running);
        let accept = thread::spawn(move || accept_loop(listener, pool, mail_tx, accept_running));

        Ok(DispatcherHandle {
            addr,
            running,
            accept: Some(accept),
            fanout: Some(fanout),
        })
    }
}

/// Handle to a running dispatcher.
pub struct DispatcherHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
    fanout: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections, let active sessions run to completion,
    /// and wait for in-flight mail to reach every receiver.
    pub fn shutdown(mut self) {
        debug!("received kill code");
        self.running.store(false, Ordering::SeqCst);

        // The accept loop is parked inside accept(); poke it awake.
        let _ = TcpStream::connect(wake_addr(self.addr));

        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }

        // With the accept loop gone the mail channel closes once the last
        // active session finishes, which ends the fan-out loop after it
        // has drained everything already queued.
        if let Some(handle) = self.fanout.take() {
            let _ = handle.join();
        }

        info!("dispatcher stopped");
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    }
}

fn accept_loop(
    listener: SmtpListener,
    pool: ServerPool,
    mail_tx: SyncSender<MailItem>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let conn = match listener.accept() {
            Ok(conn) => conn,
            Err(err) if is_transient_accept_error(&err) => {
                warn!("transient problem accepting SMTP request: {err}");
                continue;
            }
            Err(err) => {
                error!("problem accepting SMTP requests: {err}");
                break;
            }
        };

        if !running.load(Ordering::SeqCst) {
            break;
        }

        match pool.next(conn, mail_tx.clone()) {
            Ok(worker) => {
                thread::spawn(move || worker.work());
            }
            Err(err) => {
                // The connection was dropped (closed) with the failure.
                error!("{err}");
            }
        }
    }

    debug!("accept loop stopped");
}

fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

fn fan_out_loop(mail_rx: Receiver<MailItem>, receivers: Vec<Arc<dyn MailItemReceiver>>) {
    info!("{} receiver(s) listening", receivers.len());

    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    while let Ok(item) = mail_rx.recv() {
        for receiver in &receivers {
            let receiver = Arc::clone(receiver);
            let item = item.clone();

            in_flight.push(thread::spawn(move || {
                if let Err(err) = receiver.receive(&item) {
                    error!("receiver failed for mail {}: {err}", item.id);
                }
            }));
        }

        // Finished invocations no longer need tracking.
        in_flight.retain(|handle| !handle.is_finished());
    }

    for handle in in_flight {
        let _ = handle.join();
    }

    debug!("shutting down receiver channel");
}
