//! Daemon Client
//!
//! Delivers commands to the privileged fan control daemon over its Unix
//! socket. One connection per command: connect, write the encoded payload,
//! close. Only the query commands read anything back.

use std::io::{self, Read, Write};
use std::mem;
use std::net::Shutdown;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use damfc_error::{FanControlError, Result};
use damfc_protocol::{Command, DriverStatus, TemperatureReport};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::constants::{limits, paths, timing};

/// Delivery of one command to the daemon
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait Transport {
    /// Fire-and-forget. `Ok` means the bytes reached the OS socket buffer,
    /// not that the daemon acted on them.
    fn send(&self, command: &Command) -> Result<()>;

    /// Send and read the daemon's reply until it closes the connection
    fn query(&self, command: &Command) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, command: &Command) -> Result<()> {
        (**self).send(command)
    }

    fn query(&self, command: &Command) -> Result<Vec<u8>> {
        (**self).query(command)
    }
}

/// Transport over the daemon's filesystem-path Unix stream socket
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for UnixSocketTransport {
    fn default() -> Self {
        Self::new(paths::SOCKET_PATH)
    }
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: timing::SOCKET_TIMEOUT,
        }
    }

    /// Read/write timeout applied to every connection
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the daemon socket exists (does not connect)
    pub fn is_daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    fn connect(&self) -> Result<UnixStream> {
        let connected = if self.timeout.is_zero() {
            UnixStream::connect(&self.socket_path)
        } else {
            connect_within(&self.socket_path, self.timeout)
        };

        let stream = connected.map_err(|source| {
            error!(
                "Failed to connect to daemon at {}: {}",
                self.socket_path.display(),
                source
            );
            if source.kind() == io::ErrorKind::TimedOut {
                FanControlError::timeout(format!(
                    "connect to {} after {} ms",
                    self.socket_path.display(),
                    self.timeout.as_millis()
                ))
            } else {
                FanControlError::TransportConnect {
                    path: self.socket_path.clone(),
                    source,
                }
            }
        })?;

        // A zero duration is rejected by the OS; treat it as "no timeout"
        let timeout = Some(self.timeout).filter(|t| !t.is_zero());
        stream
            .set_read_timeout(timeout)
            .map_err(|e| io_error("set read timeout", e))?;
        stream
            .set_write_timeout(timeout)
            .map_err(|e| io_error("set write timeout", e))?;

        Ok(stream)
    }

    /// Validate, encode, connect and write. Nothing touches the socket
    /// unless the command is well-formed and `reply` matches whether the
    /// daemon answers it.
    fn deliver(&self, command: &Command, reply: bool) -> Result<UnixStream> {
        match (command.expects_reply(), reply) {
            (true, false) => {
                return Err(FanControlError::InvalidCommand(format!(
                    "{} is answered by the daemon; use query",
                    command.type_name()
                )))
            }
            (false, true) => {
                return Err(FanControlError::InvalidCommand(format!(
                    "{} gets no reply from the daemon; use send",
                    command.type_name()
                )))
            }
            _ => {}
        }
        command
            .validate()
            .map_err(FanControlError::InvalidCommand)?;
        let payload = command.encode()?;

        let mut stream = self.connect()?;
        stream
            .write_all(&payload)
            .and_then(|_| stream.flush())
            .map_err(|e| io_error("send command", e))?;

        debug!("Sent {} ({} bytes)", command.type_name(), payload.len());
        Ok(stream)
    }
}

impl Transport for UnixSocketTransport {
    fn send(&self, command: &Command) -> Result<()> {
        // Dropping the stream closes the connection; the daemon handles
        // exactly one command per accept.
        self.deliver(command, false).map(drop)
    }

    fn query(&self, command: &Command) -> Result<Vec<u8>> {
        let stream = self.deliver(command, true)?;
        // The daemon may already have closed its side, nothing to report then
        let _ = stream.shutdown(Shutdown::Write);

        let mut reply = Vec::new();
        stream
            .take(limits::MAX_REPLY_SIZE as u64 + 1)
            .read_to_end(&mut reply)
            .map_err(|e| io_error("read reply", e))?;

        if reply.len() > limits::MAX_REPLY_SIZE {
            return Err(FanControlError::MessageTooLarge {
                size: reply.len(),
                max_size: limits::MAX_REPLY_SIZE,
            });
        }
        if reply.is_empty() {
            return Err(FanControlError::DaemonResponse(format!(
                "Daemon closed connection without answering {}",
                command.type_name()
            )));
        }

        debug!("Received {} byte reply to {}", reply.len(), command.type_name());
        Ok(reply)
    }
}

/// Connect to a filesystem-path socket, giving up after `timeout`.
///
/// A listener whose backlog is full makes a non-blocking connect fail with
/// `EAGAIN`; that is retried until the deadline instead of blocking forever
/// the way `UnixStream::connect` does.
fn connect_within(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
    let (addr, addr_len) = sockaddr_un(path)?;
    let deadline = Instant::now() + timeout;

    loop {
        let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owned from here on, so every early return closes the descriptor
        let stream = unsafe { UnixStream::from_raw_fd(fd) };
        stream.set_nonblocking(true)?;

        let rc = unsafe {
            libc::connect(
                fd,
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                addr_len,
            )
        };
        if rc == 0 {
            stream.set_nonblocking(false)?;
            return Ok(stream);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINPROGRESS) => {
                wait_connected(fd, deadline)?;
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Some(libc::EAGAIN) | Some(libc::EINTR) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "daemon backlog full"));
                }
                thread::sleep(timing::CONNECT_RETRY.min(deadline - now));
            }
            _ => return Err(err),
        }
    }
}

/// Wait for an in-progress connect on `fd` to finish
fn wait_connected(fd: RawFd, deadline: Instant) -> io::Result<()> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        };
        let millis = remaining.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            continue;
        }

        let mut so_error: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut so_error as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        return match so_error {
            0 => Ok(()),
            code => Err(io::Error::from_raw_os_error(code)),
        };
    }
}

fn sockaddr_un(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    let bytes = path.as_os_str().as_bytes();
    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path too long",
        ));
    }

    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    let len = mem::size_of::<libc::sa_family_t>() + bytes.len() + 1;
    Ok((addr, len as libc::socklen_t))
}

fn io_error(action: &str, e: io::Error) -> FanControlError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            FanControlError::timeout(format!("{} on daemon socket", action))
        }
        _ => FanControlError::transport(format!("Failed to {}: {}", action, e)),
    }
}

fn query_json<T, R>(transport: &R, command: Command) -> Result<T>
where
    T: DeserializeOwned,
    R: Transport + ?Sized,
{
    let reply = transport.query(&command)?;
    serde_json::from_slice(&reply).map_err(|e| {
        FanControlError::DaemonResponse(format!(
            "Malformed reply to {}: {}",
            command.type_name(),
            e
        ))
    })
}

/// Current CPU/GPU temperatures as reported by the daemon
pub fn read_temperatures<R: Transport + ?Sized>(transport: &R) -> Result<TemperatureReport> {
    query_json(transport, Command::GetTemp)
}

/// Kernel driver state as reported by the daemon
pub fn driver_status<R: Transport + ?Sized>(transport: &R) -> Result<DriverStatus> {
    query_json(transport, Command::GetDriverStatus)
}
