//! Terminal session
//!
//! Owns the child process, the parser/screen pair and the I/O thread. The
//! reader blocks in poll on the PTY plus a wakeup pipe, feeds bytes to the
//! interpreter under the screen lock, and drains the host's event mailbox
//! only at loop boundaries, never mid-dispatch. The renderer takes
//! snapshots through the same lock and never mutates the screen.
//!
//! Lifecycle: PTY EOF or a fatal read error moves the session to its
//! terminal state and fires the one-shot `on_closed` callback with the
//! child's exit code. `shutdown` sets the terminating flag, wakes the
//! reader and joins it.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, warn};

use cinder_core::{Dimensions, Snapshot};
use cinder_pty::{exit_code, Child, Result, Signal, WaitEvent, WakeupHandle, WindowSize};

use crate::terminal::Terminal;

/// PTY read buffer size; reused for every read on the I/O thread.
const READ_BUFFER_SIZE: usize = 65536;

/// Callback fired exactly once when the session reaches its terminal state.
pub type OnClosed = Box<dyn FnOnce(i32) + Send>;

enum SessionEvent {
    /// Encoded input bytes for the child.
    Input(Vec<u8>),
    /// New terminal size, in cells and pixels.
    Resize(WindowSize),
}

pub struct Session {
    terminal: Arc<Mutex<Terminal>>,
    events: Sender<SessionEvent>,
    wakeup: WakeupHandle,
    terminating: Arc<AtomicBool>,
    dirty: Arc<AtomicBool>,
    /// Bytes queued toward a back-pressured PTY.
    backlog: Arc<AtomicUsize>,
    io_thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawn the user's shell on a fresh PTY and start the I/O thread.
    pub fn spawn_shell(size: WindowSize, on_closed: OnClosed) -> Result<Self> {
        let child = Child::spawn_shell(size)?;
        Ok(Self::new(child, size, on_closed))
    }

    /// Drive an already-spawned child.
    pub fn new(child: Child, size: WindowSize, on_closed: OnClosed) -> Self {
        let dims = Dimensions::new(size.cols as usize, size.rows as usize);
        let mut terminal = Terminal::new(dims);
        terminal.set_window_pixel_size(size.pixel_width as u32, size.pixel_height as u32);
        let terminal = Arc::new(Mutex::new(terminal));

        let (tx, rx) = channel();
        let wakeup = child.pty().wakeup_handle();
        let terminating = Arc::new(AtomicBool::new(false));
        let dirty = Arc::new(AtomicBool::new(false));
        let backlog = Arc::new(AtomicUsize::new(0));

        let io_thread = {
            let terminal = Arc::clone(&terminal);
            let terminating = Arc::clone(&terminating);
            let dirty = Arc::clone(&dirty);
            let backlog = Arc::clone(&backlog);
            std::thread::Builder::new()
                .name("cinder-io".to_string())
                .spawn(move || {
                    io_loop(child, terminal, rx, terminating, dirty, backlog, on_closed)
                })
                .expect("spawning the I/O thread cannot fail")
        };

        Self {
            terminal,
            events: tx,
            wakeup,
            terminating,
            dirty,
            backlog,
            io_thread: Some(io_thread),
        }
    }

    /// Shared handle to the interpreter; lock to inspect or take events.
    pub fn terminal(&self) -> Arc<Mutex<Terminal>> {
        Arc::clone(&self.terminal)
    }

    /// A consistent view of the visible region for the renderer.
    pub fn snapshot(&self) -> Snapshot {
        self.terminal
            .lock()
            .expect("screen lock poisoned")
            .snapshot()
    }

    /// True once since the last call if new output changed the screen.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Bytes waiting on a back-pressured PTY write.
    pub fn pending_output(&self) -> usize {
        self.backlog.load(Ordering::Relaxed)
    }

    /// Queue encoded input bytes for the child. Applied by the I/O thread
    /// at the next loop boundary.
    pub fn send_input(&self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        if self.events.send(SessionEvent::Input(bytes)).is_ok() {
            self.wakeup.wake();
        }
    }

    /// Resize the terminal and the child's view of it.
    pub fn resize(&self, size: WindowSize) {
        if self.events.send(SessionEvent::Resize(size)).is_ok() {
            self.wakeup.wake();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminating.load(Ordering::Acquire)
            || self.io_thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the I/O thread at its next loop boundary and join it.
    /// Snapshots already handed out stay valid.
    pub fn shutdown(&mut self) {
        self.terminating.store(true, Ordering::Release);
        self.wakeup.wake();
        if let Some(thread) = self.io_thread.take() {
            if thread.join().is_err() {
                error!("I/O thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn io_loop(
    mut child: Child,
    terminal: Arc<Mutex<Terminal>>,
    events: Receiver<SessionEvent>,
    terminating: Arc<AtomicBool>,
    dirty: Arc<AtomicBool>,
    backlog: Arc<AtomicUsize>,
    on_closed: OnClosed,
) {
    if let Err(e) = child.pty().set_nonblocking(true) {
        error!("failed to make pty non-blocking: {e}");
    }

    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut outbox: Vec<u8> = Vec::new();
    let mut pty_closed = false;

    'session: while !terminating.load(Ordering::Acquire) {
        // Mailbox first: input and resizes apply between dispatches only.
        loop {
            match events.try_recv() {
                Ok(SessionEvent::Input(bytes)) => outbox.extend_from_slice(&bytes),
                Ok(SessionEvent::Resize(size)) => {
                    if let Err(e) = child.resize(size) {
                        warn!("pty resize failed: {e}");
                    }
                    let mut term = terminal.lock().expect("screen lock poisoned");
                    term.set_window_pixel_size(size.pixel_width as u32, size.pixel_height as u32);
                    term.resize(Dimensions::new(size.cols as usize, size.rows as usize));
                    dirty.store(true, Ordering::Release);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        // Interpreter replies go out before we read more.
        {
            let mut term = terminal.lock().expect("screen lock poisoned");
            for reply in term.take_pending_responses() {
                outbox.extend_from_slice(&reply);
            }
        }
        if !flush(&mut child, &mut outbox, &backlog) {
            break 'session;
        }

        match child.pty().wait_readable() {
            Ok(WaitEvent::Readable) => loop {
                match child.read(&mut buf) {
                    Ok(0) => {
                        pty_closed = true;
                        break 'session;
                    }
                    Ok(n) => {
                        let mut term = terminal.lock().expect("screen lock poisoned");
                        term.process(&buf[..n]);
                        if !term.screen().modes().synchronized_output {
                            dirty.store(true, Ordering::Release);
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO: the slave side is gone.
                        debug!("pty read failed: {e}");
                        pty_closed = true;
                        break 'session;
                    }
                }
            },
            Ok(WaitEvent::Wakeup) | Ok(WaitEvent::Interrupted) => {}
            Err(e) => {
                error!("pty wait failed: {e}");
                break 'session;
            }
        }
    }

    terminating.store(true, Ordering::Release);
    on_closed(collect_exit_code(&child, pty_closed));
}

/// Exit code for `on_closed`. After PTY EOF the child has (all but) exited,
/// so a blocking wait is safe; after an externally requested shutdown the
/// child may still be running and gets a hangup plus a short grace period.
fn collect_exit_code(child: &Child, pty_closed: bool) -> i32 {
    if pty_closed {
        return child.wait().map(exit_code).unwrap_or(0);
    }
    let _ = child.signal(Signal::SIGHUP);
    for _ in 0..50 {
        match child.try_wait() {
            Ok(Some(status)) => return exit_code(status),
            Ok(None) => std::thread::sleep(std::time::Duration::from_millis(10)),
            Err(_) => return 0,
        }
    }
    let _ = child.signal(Signal::SIGKILL);
    child.wait().map(exit_code).unwrap_or(0)
}

/// Write as much of the outbox as the PTY accepts; the rest stays queued.
/// Returns false on a fatal write error.
fn flush(child: &mut Child, outbox: &mut Vec<u8>, backlog: &Arc<AtomicUsize>) -> bool {
    while !outbox.is_empty() {
        match child.write(outbox.as_slice()) {
            Ok(0) => break,
            Ok(n) => {
                outbox.drain(..n);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("pty write failed: {e}");
                backlog.store(0, Ordering::Relaxed);
                return false;
            }
        }
    }
    backlog.store(outbox.len(), Ordering::Relaxed);
    if !outbox.is_empty() {
        warn!("pty write back-pressure: {} bytes queued", outbox.len());
    }
    true
}
