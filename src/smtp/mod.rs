//! SMTP server implementation: listener, worker pool, session state
//! machine, and the dispatcher wiring them to receivers.

pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod pool;
pub mod response;
pub mod worker;

pub use command::SmtpCommand;
pub use connection::{Connection, SmtpStream};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::SmtpError;
pub use listener::SmtpListener;
pub use pool::ServerPool;
pub use response::SmtpResponse;
pub use worker::{SmtpWorker, WorkerState, COMMAND_TIMEOUT};
