//! Pseudoterminal master
//!
//! Owns the master side of a PTY pair plus a self-pipe used to interrupt a
//! blocked reader from another thread. The reader multiplexes the master fd
//! and the pipe with poll(2); `WakeupHandle::wake` is async-signal-safe
//! cheap (a single write) and may be called from any thread.
//!
//! On Linux the master comes from posix_openpt; macOS needs openpty because
//! a posix_openpt master is not fully functional until the slave is opened.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::termios::{self, SetArg};
use nix::unistd::pipe;

use crate::error::{Error, Result};
use crate::size::WindowSize;

/// Outcome of waiting on the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    /// The master has bytes (or a hangup; the next read reports it).
    Readable,
    /// Another thread asked the reader to wake up.
    Wakeup,
    /// The wait was interrupted by a signal; just retry.
    Interrupted,
}

/// Cross-thread wakeup for a reader blocked in [`Pty::wait_readable`].
#[derive(Debug, Clone)]
pub struct WakeupHandle {
    pipe_write: Arc<OwnedFd>,
}

impl WakeupHandle {
    pub fn wake(&self) {
        // Best effort: a full pipe already guarantees a pending wakeup.
        let _ = nix::unistd::write(self.pipe_write.as_raw_fd(), &[0u8]);
    }
}

pub struct Pty {
    master: OwnedFd,
    file: File,
    slave_path: String,
    /// Kept open on macOS so the master stays functional.
    #[cfg(target_os = "macos")]
    _slave: OwnedFd,
    pipe_read: OwnedFd,
    pipe_write: Arc<OwnedFd>,
}

impl Pty {
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self> {
        use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt};
        use std::os::fd::IntoRawFd;

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)?;
        grantpt(&master)?;
        unlockpt(&master)?;
        let slave_path = unsafe { ptsname(&master)? };
        let master = unsafe { OwnedFd::from_raw_fd(master.into_raw_fd()) };
        Self::finish(master, slave_path, None)
    }

    #[cfg(target_os = "macos")]
    pub fn new() -> Result<Self> {
        use nix::pty::openpty;

        let pair = openpty(None, None)?;
        let slave_path = unsafe {
            let name = libc::ttyname(pair.slave.as_raw_fd());
            if name.is_null() {
                return Err(Error::PtyCreation("ttyname failed for slave".into()));
            }
            std::ffi::CStr::from_ptr(name).to_string_lossy().into_owned()
        };
        Self::finish(pair.master, slave_path, Some(pair.slave))
    }

    fn finish(master: OwnedFd, slave_path: String, slave: Option<OwnedFd>) -> Result<Self> {
        let file = File::from(master.try_clone().map_err(Error::Io)?);
        let (pipe_read, pipe_write) = pipe()?;
        let pipe_read = unsafe { OwnedFd::from_raw_fd(pipe_read) };
        let pipe_write = unsafe { OwnedFd::from_raw_fd(pipe_write) };
        set_nonblocking_fd(pipe_read.as_raw_fd(), true)?;
        set_nonblocking_fd(pipe_write.as_raw_fd(), true)?;
        #[cfg(not(target_os = "macos"))]
        let _ = slave;
        Ok(Self {
            master,
            file,
            slave_path,
            #[cfg(target_os = "macos")]
            _slave: slave.expect("openpty returns a slave fd"),
            pipe_read,
            pipe_write: Arc::new(pipe_write),
        })
    }

    pub fn slave_path(&self) -> &str {
        &self.slave_path
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// A cloneable handle that interrupts [`Pty::wait_readable`].
    pub fn wakeup_handle(&self) -> WakeupHandle {
        WakeupHandle {
            pipe_write: Arc::clone(&self.pipe_write),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        set_nonblocking_fd(self.master.as_raw_fd(), nonblocking)
    }

    /// Block until the master is readable or a wakeup arrives.
    pub fn wait_readable(&self) -> Result<WaitEvent> {
        let master_fd = self.master.as_fd();
        let pipe_read_fd = self.pipe_read.as_fd();
        let mut fds = [
            PollFd::new(&master_fd, PollFlags::POLLIN),
            PollFd::new(&pipe_read_fd, PollFlags::POLLIN),
        ];
        match poll(&mut fds, -1) {
            Err(Errno::EINTR) => return Ok(WaitEvent::Interrupted),
            Err(e) => return Err(Error::Nix(e)),
            Ok(_) => {}
        }

        let master_ready = fds[0]
            .revents()
            .map_or(false, |r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR));
        let woken = fds[1]
            .revents()
            .map_or(false, |r| r.contains(PollFlags::POLLIN));

        if woken {
            self.drain_wakeups();
        }
        if master_ready {
            Ok(WaitEvent::Readable)
        } else if woken {
            Ok(WaitEvent::Wakeup)
        } else {
            Ok(WaitEvent::Interrupted)
        }
    }

    fn drain_wakeups(&self) {
        let mut buf = [0u8; 64];
        loop {
            match nix::unistd::read(self.pipe_read.as_raw_fd(), &mut buf) {
                Ok(n) if n == buf.len() => continue,
                _ => break,
            }
        }
    }

    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let ws = size.to_winsize();
        let rc = unsafe {
            libc::ioctl(
                self.master.as_raw_fd(),
                libc::TIOCSWINSZ as libc::c_ulong,
                &ws,
            )
        };
        if rc == -1 {
            Err(Error::WindowSize(io::Error::last_os_error().to_string()))
        } else {
            Ok(())
        }
    }

    pub fn get_window_size(&self) -> Result<WindowSize> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::ioctl(
                self.master.as_raw_fd(),
                libc::TIOCGWINSZ as libc::c_ulong,
                &mut ws,
            )
        };
        if rc == -1 {
            Err(Error::WindowSize(io::Error::last_os_error().to_string()))
        } else {
            Ok(WindowSize::from(ws))
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for Pty {
    fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }
}

impl AsFd for Pty {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }
}

fn set_nonblocking_fd(fd: RawFd, nonblocking: bool) -> Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags);
    let flags = if nonblocking {
        flags | OFlag::O_NONBLOCK
    } else {
        flags & !OFlag::O_NONBLOCK
    };
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Open the slave side; used in the child after fork.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    use std::ffi::CString;
    let path = CString::new(path).map_err(|e| Error::PtyCreation(e.to_string()))?;
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
    if fd < 0 {
        return Err(Error::PtyCreation(io::Error::last_os_error().to_string()));
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// "stty sane" cooked-mode termios for the slave.
pub fn configure_slave(fd: RawFd) -> Result<()> {
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut tio = termios::tcgetattr(borrowed)?;
    tio.input_flags &= !(termios::InputFlags::IGNBRK
        | termios::InputFlags::PARMRK
        | termios::InputFlags::ISTRIP
        | termios::InputFlags::INLCR
        | termios::InputFlags::IGNCR);
    tio.input_flags |= termios::InputFlags::BRKINT
        | termios::InputFlags::ICRNL
        | termios::InputFlags::IXON;
    tio.output_flags |= termios::OutputFlags::OPOST | termios::OutputFlags::ONLCR;
    tio.local_flags |= termios::LocalFlags::ECHO
        | termios::LocalFlags::ECHONL
        | termios::LocalFlags::ICANON
        | termios::LocalFlags::ISIG
        | termios::LocalFlags::IEXTEN;
    tio.control_flags &= !(termios::ControlFlags::CSIZE | termios::ControlFlags::PARENB);
    tio.control_flags |= termios::ControlFlags::CS8;
    tio.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 1;
    tio.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    termios::tcsetattr(borrowed, SetArg::TCSANOW, &tio)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_creation() {
        let pty = Pty::new().unwrap();
        assert!(!pty.slave_path().is_empty());
        #[cfg(target_os = "linux")]
        assert!(pty.slave_path().starts_with("/dev/pts/"));
    }

    #[test]
    fn test_window_size() {
        let pty = Pty::new().unwrap();
        pty.set_window_size(WindowSize::new(120, 40)).unwrap();
        let size = pty.get_window_size().unwrap();
        assert_eq!(size.cols, 120);
        assert_eq!(size.rows, 40);
    }

    #[test]
    fn test_wakeup_interrupts_wait() {
        let pty = Pty::new().unwrap();
        let handle = pty.wakeup_handle();
        let waiter = std::thread::spawn(move || {
            // Nothing is connected to the slave yet, so only the wakeup
            // can end this wait.
            pty.wait_readable().unwrap()
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        handle.wake();
        assert_eq!(waiter.join().unwrap(), WaitEvent::Wakeup);
    }

    #[test]
    fn test_nonblocking_toggle() {
        let pty = Pty::new().unwrap();
        pty.set_nonblocking(true).unwrap();
        pty.set_nonblocking(false).unwrap();
    }
}
