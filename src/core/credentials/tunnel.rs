//! SSH local port forwarding.
//!
//! A [`TunnelHandle`] owns an authenticated SSH session and a local TCP
//! listener. A single background worker accepts local clients, opens one
//! `direct-tcpip` channel per client towards the remote database, and pumps
//! bytes both ways. The session runs non-blocking so one thread can serve
//! every channel.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ssh2::{Channel, Session};
use tracing::{debug, trace, warn};

use super::pem::{self, PemLabel};
use crate::core::constants::TUNNEL_KEEPALIVE_SECS;
use crate::core::types::Sensitive;
use crate::error::{Result, TunnelError};

const IDLE_SLEEP: Duration = Duration::from_millis(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const BUFFER_SIZE: usize = 16 * 1024;

/// libssh2's "would block" code.
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

/// How to authenticate against the SSH server.
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// PEM-encoded RSA private key.
    PrivateKey(Sensitive<Vec<u8>>),
    Password(Sensitive<String>),
}

/// Everything needed to open one tunnel.
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub auth: SshAuth,
    pub remote_host: String,
    pub remote_port: u16,
    pub bind_host: String,
    /// `0` lets the OS choose.
    pub local_bind_port: u16,
}

/// A live local-port-forwarding session.
///
/// Dropping the handle stops forwarding and closes the session.
#[derive(Debug)]
pub struct TunnelHandle {
    local_addr: SocketAddr,
    remote: (String, u16),
    keepalive: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TunnelHandle {
    /// Local address clients should connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Negotiated local port.
    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn remote(&self) -> (&str, u16) {
        (&self.remote.0, self.remote.1)
    }

    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    pub fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop forwarding and wait for the worker to exit.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("tunnel worker panicked");
            }
            debug!(local = %self.local_addr, "tunnel closed");
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Parse PEM text of an RSA private key from raw key bytes.
///
/// DER input is armored as a `PRIVATE KEY` block.
///
/// # Errors
///
/// Returns `TunnelError::InvalidKey` for empty, non-UTF-8 or non-key input.
pub fn parse_private_key(bytes: &[u8]) -> Result<Sensitive<String>> {
    if bytes.is_empty() {
        return Err(TunnelError::InvalidKey("key is empty".into()).into());
    }

    if !pem::is_armored(bytes) {
        return Ok(Sensitive::new(pem::format_pem(bytes, PemLabel::PrivateKey)));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| TunnelError::InvalidKey("key is not valid UTF-8".into()))?;

    if !text.contains("PRIVATE KEY-----") {
        return Err(TunnelError::InvalidKey("PEM block is not a private key".into()).into());
    }
    if pem::decode_armored(bytes).is_none() {
        return Err(TunnelError::InvalidKey("PEM body is not valid base64".into()).into());
    }

    Ok(Sensitive::new(text.to_string()))
}

/// Open an SSH tunnel from `bind_host:local_bind_port` to the remote database.
///
/// # Errors
///
/// Returns a `TunnelError` for unreachable hosts, handshake or
/// authentication failure, or a local bind failure. Not retried.
pub fn open_ssh_tunnel(spec: &TunnelSpec) -> Result<TunnelHandle> {
    debug!(
        ssh_host = %spec.ssh_host,
        ssh_port = spec.ssh_port,
        remote_host = %spec.remote_host,
        remote_port = spec.remote_port,
        "opening ssh tunnel"
    );

    let session = connect_session(spec)?;
    authenticate(&session, spec)?;
    session.set_keepalive(true, TUNNEL_KEEPALIVE_SECS);

    let bind_addr = format!("{}:{}", spec.bind_host, spec.local_bind_port);
    let bind_err = |source| TunnelError::Bind {
        addr: bind_addr.clone(),
        source,
    };
    let listener = TcpListener::bind(&bind_addr).map_err(bind_err)?;
    listener.set_nonblocking(true).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;

    session.set_blocking(false);

    let stop = Arc::new(AtomicBool::new(false));
    let forwarder = Forwarder {
        session,
        listener,
        remote_host: spec.remote_host.clone(),
        remote_port: spec.remote_port,
        stop: Arc::clone(&stop),
        streams: Vec::new(),
    };
    let worker = thread::Builder::new()
        .name("dbseal-tunnel".into())
        .spawn(move || forwarder.run())?;

    debug!(local = %local_addr, "ssh tunnel open");

    Ok(TunnelHandle {
        local_addr,
        remote: (spec.remote_host.clone(), spec.remote_port),
        keepalive: Duration::from_secs(u64::from(TUNNEL_KEEPALIVE_SECS)),
        stop,
        worker: Some(worker),
    })
}

fn connect_session(spec: &TunnelSpec) -> Result<Session> {
    let connect_err = |source| TunnelError::Connect {
        host: spec.ssh_host.clone(),
        port: spec.ssh_port,
        source,
    };

    let addr = (spec.ssh_host.as_str(), spec.ssh_port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| connect_err(io::Error::new(ErrorKind::NotFound, "no address resolved")))?;
    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(connect_err)?;

    let mut session = Session::new().map_err(TunnelError::from)?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|source| TunnelError::Handshake {
        host: spec.ssh_host.clone(),
        source,
    })?;

    Ok(session)
}

fn authenticate(session: &Session, spec: &TunnelSpec) -> Result<()> {
    let auth_err = |reason: String| TunnelError::Auth {
        user: spec.ssh_user.clone(),
        reason,
    };

    match &spec.auth {
        SshAuth::Password(password) => session
            .userauth_password(&spec.ssh_user, password.expose())
            .map_err(|e| auth_err(e.to_string()))?,
        SshAuth::PrivateKey(bytes) => {
            let key = parse_private_key(bytes.expose())?;
            pubkey_auth(session, &spec.ssh_user, key.expose())
                .map_err(|e| auth_err(e.to_string()))?;
        }
    }

    if !session.authenticated() {
        return Err(auth_err("server rejected credentials".into()).into());
    }

    debug!(user = %spec.ssh_user, "ssh authenticated");
    Ok(())
}

#[cfg(unix)]
fn pubkey_auth(
    session: &Session,
    user: &str,
    key_pem: &str,
) -> std::result::Result<(), ssh2::Error> {
    session.userauth_pubkey_memory(user, None, key_pem, None)
}

#[cfg(not(unix))]
fn pubkey_auth(
    session: &Session,
    user: &str,
    key_pem: &str,
) -> std::result::Result<(), ssh2::Error> {
    // libssh2 on WinCNG cannot load keys from memory
    let staging_err =
        |_| ssh2::Error::new(ssh2::ErrorCode::Session(-1), "failed to stage private key");
    let mut file = tempfile::NamedTempFile::new().map_err(staging_err)?;
    file.write_all(key_pem.as_bytes()).map_err(staging_err)?;
    session.userauth_pubkey_file(user, None, file.path(), None)
}

struct ForwardedStream {
    client: TcpStream,
    channel: Channel,
    closed: bool,
}

struct Forwarder {
    session: Session,
    listener: TcpListener,
    remote_host: String,
    remote_port: u16,
    stop: Arc<AtomicBool>,
    streams: Vec<ForwardedStream>,
}

impl Forwarder {
    fn run(mut self) {
        let mut last_keepalive = Instant::now();
        let mut buf = vec![0u8; BUFFER_SIZE];

        while !self.stop.load(Ordering::SeqCst) {
            let mut progressed = self.accept();

            for stream in &mut self.streams {
                match pump(stream, &mut buf) {
                    Ok(moved) => progressed |= moved,
                    Err(e) => {
                        trace!(error = %e, "forwarded stream ended");
                        stream.closed = true;
                    }
                }
            }
            self.streams.retain(|s| !s.closed);

            if last_keepalive.elapsed() >= Duration::from_secs(1) {
                if let Err(e) = self.session.keepalive_send() {
                    if !would_block_ssh(&e) {
                        warn!(error = %e, "ssh keepalive failed");
                    }
                }
                last_keepalive = Instant::now();
            }

            if !progressed {
                thread::sleep(IDLE_SLEEP);
            }
        }

        for mut stream in self.streams.drain(..) {
            let _ = retry(|| stream.channel.close());
        }
        let _ = retry(|| self.session.disconnect(None, "tunnel closed", None));
    }

    fn accept(&mut self) -> bool {
        let client = match self.listener.accept() {
            Ok((client, peer)) => {
                trace!(peer = %peer, "tunnel client accepted");
                client
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return false,
            Err(e) => {
                warn!(error = %e, "tunnel accept failed");
                return false;
            }
        };

        if let Err(e) = client.set_nonblocking(true) {
            warn!(error = %e, "failed to configure tunnel client");
            return false;
        }

        match retry(|| {
            self.session
                .channel_direct_tcpip(&self.remote_host, self.remote_port, None)
        }) {
            Ok(channel) => {
                self.streams.push(ForwardedStream {
                    client,
                    channel,
                    closed: false,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to open forwarding channel");
                false
            }
        }
    }
}

/// Move whatever is ready in either direction. Errors end the stream.
fn pump(stream: &mut ForwardedStream, buf: &mut [u8]) -> io::Result<bool> {
    let mut progressed = false;

    match stream.client.read(buf) {
        Ok(0) => return Err(io::Error::new(ErrorKind::UnexpectedEof, "client closed")),
        Ok(n) => {
            write_fully(&mut stream.channel, &buf[..n])?;
            progressed = true;
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        Err(e) => return Err(e),
    }

    match stream.channel.read(buf) {
        Ok(0) if stream.channel.eof() => {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "remote closed"))
        }
        Ok(0) => {}
        Ok(n) => {
            write_fully(&mut stream.client, &buf[..n])?;
            progressed = true;
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        Err(e) => return Err(e),
    }

    Ok(progressed)
}

fn write_fully(writer: &mut impl Write, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match writer.write(data) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "peer closed")),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(IDLE_SLEEP),
            Err(e) => return Err(e),
        }
    }
    writer.flush().or_else(|e| {
        if e.kind() == ErrorKind::WouldBlock {
            Ok(())
        } else {
            Err(e)
        }
    })
}

fn would_block_ssh(e: &ssh2::Error) -> bool {
    matches!(e.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_EAGAIN))
}

/// Repeat a non-blocking libssh2 call until it stops asking to be retried.
fn retry<T>(
    mut op: impl FnMut() -> std::result::Result<T, ssh2::Error>,
) -> std::result::Result<T, ssh2::Error> {
    loop {
        match op() {
            Err(e) if would_block_ssh(&e) => thread::sleep(IDLE_SLEEP),
            other => return other,
        }
    }
}
