//! Child process attached to a PTY
//!
//! fork/exec with the slave as the controlling terminal. The parent keeps
//! the master for I/O and gets SIGWINCH forwarding on resize plus
//! non-blocking exit status collection.

use std::ffi::{CString, OsStr};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use nix::libc;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{dup2, execvp, fork, setsid, ForkResult, Pid};

use crate::error::{Error, Result};
use crate::pty::{configure_slave, open_slave, Pty};
use crate::size::WindowSize;

pub struct Child {
    pty: Pty,
    pid: Pid,
}

impl Child {
    /// Spawn `program` with `args` on a fresh PTY. `env`, when given,
    /// replaces the inherited environment.
    pub fn spawn<S, I>(
        program: S,
        args: I,
        env: Option<Vec<(String, String)>>,
        size: WindowSize,
    ) -> Result<Self>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
    {
        let pty = Pty::new()?;
        pty.set_window_size(size)?;
        let slave_path = pty.slave_path().to_string();

        let program_cstr = CString::new(program.as_ref().as_bytes())
            .map_err(|e| Error::SpawnFailed(e.to_string()))?;
        let mut argv = vec![program_cstr.clone()];
        for arg in args {
            argv.push(
                CString::new(arg.as_ref().as_bytes())
                    .map_err(|e| Error::SpawnFailed(e.to_string()))?,
            );
        }
        let envp: Option<Vec<CString>> = env.map(|vars| {
            vars.into_iter()
                .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
                .collect()
        });

        match unsafe { fork() }? {
            ForkResult::Parent { child } => Ok(Self { pty, pid: child }),
            ForkResult::Child => {
                // Only async-signal-safe calls from here until exec.
                if setsid().is_err() {
                    std::process::exit(1);
                }
                let slave = match open_slave(&slave_path) {
                    Ok(fd) => fd,
                    Err(_) => std::process::exit(1),
                };
                let slave_raw = slave.as_raw_fd();
                unsafe {
                    if libc::ioctl(slave_raw, libc::TIOCSCTTY as libc::c_ulong, 0) < 0 {
                        std::process::exit(1);
                    }
                }
                if configure_slave(slave_raw).is_err() {
                    std::process::exit(1);
                }
                for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                    if dup2(slave_raw, fd).is_err() {
                        std::process::exit(1);
                    }
                }
                if slave_raw > 2 {
                    drop(slave);
                }

                if let Some(vars) = envp {
                    #[cfg(target_os = "linux")]
                    unsafe {
                        libc::clearenv();
                    }
                    #[cfg(not(target_os = "linux"))]
                    for (key, _) in std::env::vars_os() {
                        std::env::remove_var(&key);
                    }
                    for var in vars {
                        unsafe {
                            libc::putenv(var.into_raw());
                        }
                    }
                }

                let _ = execvp(&program_cstr, &argv);
                std::process::exit(127);
            }
        }
    }

    /// Spawn `$SHELL` (fallback /bin/sh) as a login shell with
    /// TERM=xterm-256color.
    pub fn spawn_shell(size: WindowSize) -> Result<Self> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut env: Vec<(String, String)> = std::env::vars()
            .filter(|(k, _)| k != "TERM")
            .collect();
        env.push(("TERM".to_string(), "xterm-256color".to_string()));
        Self::spawn(shell, vec!["-l".to_string()], Some(env), size)
    }

    pub fn pty(&self) -> &Pty {
        &self.pty
    }

    pub fn pty_mut(&mut self) -> &mut Pty {
        &mut self.pty
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        matches!(
            waitpid(self.pid, Some(WaitPidFlag::WNOHANG)),
            Ok(WaitStatus::StillAlive)
        )
    }

    /// Non-blocking status check; Some once the child has exited.
    pub fn try_wait(&self) -> Result<Option<WaitStatus>> {
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status) => Ok(Some(status)),
            Err(e) => Err(Error::from(e)),
        }
    }

    pub fn wait(&self) -> Result<WaitStatus> {
        waitpid(self.pid, None).map_err(Error::from)
    }

    pub fn signal(&self, signal: Signal) -> Result<()> {
        kill(self.pid, signal).map_err(Error::from)
    }

    /// Resize the PTY and notify the child.
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        self.pty.set_window_size(size)?;
        let _ = self.signal(Signal::SIGWINCH);
        Ok(())
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.pty.read(buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pty.write(buf)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.pty.write_all(buf)
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.pty.as_raw_fd()
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        let _ = self.signal(Signal::SIGHUP);
    }
}

/// Map a wait status to a session exit code: the child's code when it
/// exited, 128+signal when it was killed.
pub fn exit_code(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_spawn_echo_and_read() {
        let mut child = Child::spawn(
            "/bin/echo",
            ["hello-pty"],
            None,
            WindowSize::default(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(200));
        child.pty().set_nonblocking(true).unwrap();

        let mut buf = [0u8; 1024];
        let mut output = String::new();
        loop {
            match child.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => output.push_str(&String::from_utf8_lossy(&buf[..n])),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        assert!(output.contains("hello-pty"), "got: {output:?}");
    }

    #[test]
    fn test_exit_status() {
        let child = Child::spawn(
            "/bin/sh",
            ["-c", "exit 3"],
            None,
            WindowSize::default(),
        )
        .unwrap();
        let status = child.wait().unwrap();
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn test_resize() {
        let child = Child::spawn(
            "/bin/sh",
            ["-c", "sleep 1"],
            None,
            WindowSize::default(),
        )
        .unwrap();
        child.resize(WindowSize::new(132, 50)).unwrap();
        let size = child.pty().get_window_size().unwrap();
        assert_eq!(size.cols, 132);
        let _ = child.signal(Signal::SIGTERM);
    }

    #[test]
    fn test_exit_code_mapping() {
        let pid = Pid::from_raw(1);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 0)), 0);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 42)), 42);
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            137
        );
    }
}
