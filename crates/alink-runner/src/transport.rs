//! Byte transports for the serial link.
//!
//! The engine talks to the host through a [`Transport`]: blocking single byte
//! reads, a readiness poll with timeout, raw writes and a binary-mode toggle.
//! [`StdioTransport`] serves the real link over stdin/stdout; the
//! [`MemoryTransport`] / [`MemoryLink`] pair drives the engine from tests.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use alink_protocol::with_checksum;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::TransportError;

/// A byte oriented, full duplex link.
pub trait Transport {
    /// Block until one byte is available and return it.
    fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Wait up to `timeout` for input. Returns `true` when a read would not
    /// block, including when the link has closed.
    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, TransportError>;

    /// Write raw bytes to the link.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Whether the link is in binary mode.
    fn binary_mode(&self) -> bool;

    /// Enter or leave binary mode. Outside binary mode the console's
    /// interrupt character keeps its usual meaning.
    fn set_binary_mode(&mut self, enabled: bool) -> Result<(), TransportError>;

    /// Write `payload` followed by its checksum.
    fn write_with_checksum(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.write_all(&with_checksum(payload))
    }
}

/// Read `N` bytes from the link, appending them to `buffer`.
pub fn read_field<const N: usize>(
    transport: &mut dyn Transport,
    buffer: &mut Vec<u8>,
) -> Result<[u8; N], TransportError> {
    let mut field = [0u8; N];
    for slot in field.iter_mut() {
        *slot = transport.read_byte()?;
    }
    buffer.extend_from_slice(&field);
    Ok(field)
}

/// Switches a transport's binary mode for the lifetime of the guard and
/// restores the previous mode when dropped.
pub struct BinaryModeGuard<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    previous: bool,
}

impl<'a, T: Transport + ?Sized> BinaryModeGuard<'a, T> {
    pub fn new(transport: &'a mut T, enabled: bool) -> Result<Self, TransportError> {
        let previous = transport.binary_mode();
        transport.set_binary_mode(enabled)?;
        Ok(BinaryModeGuard {
            transport,
            previous,
        })
    }
}

impl<T: Transport + ?Sized> Deref for BinaryModeGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> DerefMut for BinaryModeGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for BinaryModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.set_binary_mode(self.previous) {
            tracing::warn!("Failed to restore binary mode: {}", e);
        }
    }
}

#[cfg(unix)]
pub use stdio::StdioTransport;

#[cfg(unix)]
mod stdio {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::{AsRawFd, FromRawFd};
    use std::time::Duration;

    use super::Transport;
    use crate::error::TransportError;

    /// The serial link on the process's stdin and stdout.
    ///
    /// Input is read unbuffered from a duplicate of the stdin descriptor so
    /// that readiness polling and reads agree. When stdin is a terminal,
    /// binary mode puts it into raw mode.
    pub struct StdioTransport {
        input: File,
        output: io::Stdout,
        binary: bool,
        saved_termios: Option<libc::termios>,
    }

    impl StdioTransport {
        pub fn new() -> Result<Self, TransportError> {
            // SAFETY: dup has no memory safety preconditions.
            let fd = unsafe { libc::dup(libc::STDIN_FILENO) };
            if fd < 0 {
                return Err(io::Error::last_os_error().into());
            }
            // SAFETY: fd is a freshly duplicated descriptor owned by nobody else.
            let input = unsafe { File::from_raw_fd(fd) };
            Ok(StdioTransport {
                input,
                output: io::stdout(),
                binary: false,
                saved_termios: None,
            })
        }

        fn is_terminal(&self) -> bool {
            // SAFETY: isatty only inspects the descriptor.
            unsafe { libc::isatty(self.input.as_raw_fd()) == 1 }
        }

        fn enter_raw_mode(&mut self) -> Result<(), TransportError> {
            if self.saved_termios.is_some() || !self.is_terminal() {
                return Ok(());
            }
            let fd = self.input.as_raw_fd();
            // SAFETY: termios is plain old data, filled in by tcgetattr.
            let mut saved: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            let mut raw = saved;
            // SAFETY: raw is a valid termios obtained above.
            unsafe { libc::cfmakeraw(&mut raw) };
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            self.saved_termios = Some(saved);
            Ok(())
        }

        fn leave_raw_mode(&mut self) -> Result<(), TransportError> {
            if let Some(saved) = self.saved_termios.take() {
                // SAFETY: saved was produced by tcgetattr on the same descriptor.
                if unsafe { libc::tcsetattr(self.input.as_raw_fd(), libc::TCSANOW, &saved) } != 0 {
                    return Err(io::Error::last_os_error().into());
                }
            }
            Ok(())
        }
    }

    impl Transport for StdioTransport {
        fn read_byte(&mut self) -> Result<u8, TransportError> {
            let mut byte = [0u8; 1];
            loop {
                match self.input.read(&mut byte) {
                    Ok(0) => return Err(TransportError::Closed),
                    Ok(_) => return Ok(byte[0]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        fn poll_readable(&mut self, timeout: Duration) -> Result<bool, TransportError> {
            let mut fds = libc::pollfd {
                fd: self.input.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
            // SAFETY: fds points to exactly one initialized pollfd.
            let ready = unsafe { libc::poll(&mut fds, 1, millis) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(false);
                }
                return Err(err.into());
            }
            if ready == 0 {
                return Ok(false);
            }
            if fds.revents & (libc::POLLIN | libc::POLLHUP) != 0 {
                Ok(true)
            } else {
                Err(TransportError::PollState(fds.revents))
            }
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
            let mut out = self.output.lock();
            out.write_all(data)?;
            out.flush()?;
            Ok(())
        }

        fn binary_mode(&self) -> bool {
            self.binary
        }

        fn set_binary_mode(&mut self, enabled: bool) -> Result<(), TransportError> {
            if enabled {
                self.enter_raw_mode()?;
            } else {
                self.leave_raw_mode()?;
            }
            self.binary = enabled;
            Ok(())
        }
    }

    impl Drop for StdioTransport {
        fn drop(&mut self) {
            if let Err(e) = self.leave_raw_mode() {
                tracing::warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// In-memory transport fed through a [`MemoryLink`].
pub struct MemoryTransport {
    input: Receiver<u8>,
    pending: Option<u8>,
    output: Arc<Mutex<Vec<u8>>>,
    binary: bool,
    mode_changes: Arc<Mutex<Vec<bool>>>,
}

/// Host side of a [`MemoryTransport`].
pub struct MemoryLink {
    input: Option<Sender<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
    mode_changes: Arc<Mutex<Vec<bool>>>,
}

impl MemoryTransport {
    /// Create a connected transport and host link.
    pub fn pair() -> (MemoryTransport, MemoryLink) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let output = Arc::new(Mutex::new(Vec::new()));
        let mode_changes = Arc::new(Mutex::new(Vec::new()));
        let transport = MemoryTransport {
            input: rx,
            pending: None,
            output: Arc::clone(&output),
            binary: false,
            mode_changes: Arc::clone(&mode_changes),
        };
        let link = MemoryLink {
            input: Some(tx),
            output,
            mode_changes,
        };
        (transport, link)
    }
}

impl Transport for MemoryTransport {
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        if let Some(byte) = self.pending.take() {
            return Ok(byte);
        }
        self.input.recv().map_err(|_| TransportError::Closed)
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.input.recv_timeout(timeout) {
            Ok(byte) => {
                self.pending = Some(byte);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Ok(true),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.output.lock().extend_from_slice(data);
        Ok(())
    }

    fn binary_mode(&self) -> bool {
        self.binary
    }

    fn set_binary_mode(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.binary = enabled;
        self.mode_changes.lock().push(enabled);
        Ok(())
    }
}

impl MemoryLink {
    /// Queue bytes for the adapter to read.
    pub fn send(&self, bytes: &[u8]) {
        if let Some(input) = &self.input {
            for byte in bytes {
                // The receiver lives as long as the transport.
                let _ = input.send(*byte);
            }
        }
    }

    /// Close the input side; the adapter sees end of stream once the
    /// queued bytes are consumed.
    pub fn close(&mut self) {
        self.input = None;
    }

    /// Everything written by the adapter so far, leaving it in place.
    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    /// Take everything written by the adapter so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock())
    }

    /// Every binary mode change, in order.
    pub fn mode_changes(&self) -> Vec<bool> {
        self.mode_changes.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let (mut transport, mut link) = MemoryTransport::pair();
        link.send(&[0x21, 0x24]);
        link.close();

        assert_eq!(transport.read_byte().unwrap(), 0x21);
        assert!(transport.poll_readable(Duration::from_millis(10)).unwrap());
        assert_eq!(transport.read_byte().unwrap(), 0x24);
        assert!(matches!(transport.read_byte(), Err(TransportError::Closed)));

        transport.write_with_checksum(&[0x62, 0x22, 0x40]).unwrap();
        assert_eq!(link.take_output(), vec![0x62, 0x22, 0x40, 0x00]);
        assert!(link.output().is_empty());
    }

    #[test]
    fn test_poll_times_out_without_input() {
        let (mut transport, _link) = MemoryTransport::pair();
        assert!(!transport.poll_readable(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_read_field_appends_to_buffer() {
        let (mut transport, link) = MemoryTransport::pair();
        link.send(&[0xC0, 0x64, 0x85]);
        let mut buffer = vec![0xE4, 0x13];
        let loco: [u8; 2] = read_field(&mut transport, &mut buffer).unwrap();
        let [speed] = read_field::<1>(&mut transport, &mut buffer).unwrap();
        assert_eq!(loco, [0xC0, 0x64]);
        assert_eq!(speed, 0x85);
        assert_eq!(buffer, vec![0xE4, 0x13, 0xC0, 0x64, 0x85]);
    }

    #[test]
    fn test_binary_mode_guard_restores_on_drop() {
        let (mut transport, link) = MemoryTransport::pair();
        transport.set_binary_mode(true).unwrap();
        {
            let guard = BinaryModeGuard::new(&mut transport, false).unwrap();
            assert!(!guard.binary_mode());
        }
        assert!(transport.binary_mode());
        assert_eq!(link.mode_changes(), vec![true, false, true]);
    }

    #[test]
    fn test_binary_mode_guard_restores_on_panic() {
        let (mut transport, link) = MemoryTransport::pair();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = BinaryModeGuard::new(&mut transport, true).unwrap();
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert!(!transport.binary_mode());
        assert_eq!(link.mode_changes(), vec![true, false]);
    }
}
