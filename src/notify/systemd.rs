//! # systemd `sd_notify` protocol.
//!
//! Sends `READY=1`, `WATCHDOG=1` and `STOPPING=1` datagrams to the socket named
//! by `$NOTIFY_SOCKET`. When the variable is unset (not running under systemd)
//! every call is a no-op.
//!
//! A leading `@` names a Linux abstract socket. Other unix targets have no
//! abstract namespace and fail such names with `io::ErrorKind::Unsupported`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::notifier::SupervisorNotifier;

/// Notifier speaking the systemd notification protocol.
#[derive(Debug, Clone, Default)]
pub struct SystemdNotifier {
    socket: Option<PathBuf>,
}

impl SystemdNotifier {
    /// Reads `$NOTIFY_SOCKET`.
    pub fn from_env() -> Self {
        Self {
            socket: std::env::var_os("NOTIFY_SOCKET").map(PathBuf::from),
        }
    }

    /// Uses an explicit socket path.
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(path.into()),
        }
    }

    /// `true` when a notification socket is configured.
    pub fn is_enabled(&self) -> bool {
        self.socket.is_some()
    }

    /// Watchdog timeout advertised by systemd through `$WATCHDOG_USEC`.
    pub fn watchdog_timeout() -> Option<Duration> {
        std::env::var("WATCHDOG_USEC")
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|us| *us > 0)
            .map(Duration::from_micros)
    }

    #[cfg(unix)]
    fn send(&self, state: &str) -> io::Result<()> {
        use std::os::unix::ffi::OsStrExt;
        use std::os::unix::net::UnixDatagram;

        let Some(path) = &self.socket else {
            return Ok(());
        };
        let sock = UnixDatagram::unbound()?;
        match path.as_os_str().as_bytes().strip_prefix(b"@") {
            Some(name) => send_abstract(&sock, name, state)?,
            None => {
                sock.send_to(state.as_bytes(), path)?;
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn send(&self, _state: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn send_abstract(sock: &std::os::unix::net::UnixDatagram, name: &[u8], state: &str) -> io::Result<()> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name)?;
    sock.send_to_addr(state.as_bytes(), &addr)?;
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn send_abstract(_sock: &std::os::unix::net::UnixDatagram, _name: &[u8], _state: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract notify sockets need Linux",
    ))
}

impl SupervisorNotifier for SystemdNotifier {
    fn notify_ready(&self) -> io::Result<()> {
        self.send("READY=1")
    }

    fn notify_alive(&self) -> io::Result<()> {
        self.send("WATCHDOG=1")
    }

    fn notify_stopping(&self) -> io::Result<()> {
        self.send("STOPPING=1")
    }

    fn name(&self) -> &'static str {
        "systemd"
    }
}
