//! The listening socket, optionally wrapped in implicit TLS.

use std::fs;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};

use native_tls::{HandshakeError, Identity, TlsAcceptor};
use tracing::info;

use crate::config::Configuration;
use crate::smtp::connection::Connection;
use crate::smtp::error::SmtpError;

/// Listener owning the bound socket. When a certificate and key are
/// configured the handshake happens at accept time (implicit TLS).
pub struct SmtpListener {
    inner: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl SmtpListener {
    /// Bind according to the configuration, loading TLS credentials when
    /// both `certFile` and `keyFile` are set.
    pub fn bind(config: &Configuration) -> Result<SmtpListener, SmtpError> {
        let address = config.full_smtp_binding_address();

        if !config.cert_file.is_empty() && !config.key_file.is_empty() {
            let identity = load_identity(&config.cert_file, &config.key_file)?;
            let acceptor = TlsAcceptor::new(identity)?;

            info!("SMTP listener running on SSL - {address}");
            return Ok(SmtpListener {
                inner: TcpListener::bind(&address)?,
                tls: Some(acceptor),
            });
        }

        info!("SMTP listener running on {address}");
        Ok(SmtpListener {
            inner: TcpListener::bind(&address)?,
            tls: None,
        })
    }

    /// Wrap an already-bound plain TCP listener. Used by tests that bind
    /// to an ephemeral port first.
    pub fn from_tcp(listener: TcpListener) -> SmtpListener {
        SmtpListener {
            inner: listener,
            tls: None,
        }
    }

    /// Accept one client, performing the TLS handshake when configured.
    /// Handshake failures surface as `ConnectionAborted` so the accept
    /// loop treats them as client problems rather than listener failures.
    pub fn accept(&self) -> io::Result<Connection> {
        let (stream, _) = self.inner.accept()?;

        match &self.tls {
            Some(acceptor) => match acceptor.accept(stream) {
                Ok(tls_stream) => Ok(Connection::Tls(Box::new(tls_stream))),
                Err(HandshakeError::Failure(err)) => Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    err.to_string(),
                )),
                Err(HandshakeError::WouldBlock(_)) => Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "TLS handshake interrupted",
                )),
            },
            None => Ok(Connection::Plain(stream)),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

fn load_identity(cert_file: &str, key_file: &str) -> Result<Identity, SmtpError> {
    let mut cert = Vec::new();
    fs::File::open(cert_file)?.read_to_end(&mut cert)?;

    let mut key = Vec::new();
    fs::File::open(key_file)?.read_to_end(&mut key)?;

    Ok(Identity::from_pkcs8(&cert, &key)?)
}
