//! Engines under test.
//!
//! The driver only needs one capability from an engine: take the concatenated
//! log text, apply it through the engine's native write path into a fresh
//! database directory, and return a full dump in the `hash= key= value=`
//! form.

use crate::DriverError;
use config::{CommandLine, Settings};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How often a running command is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait EngineUnderTest {
    /// Short name used in reports.
    fn name(&self) -> &str;

    /// Applies `logs` into a new database at `db_dir` (which does not exist
    /// yet) and returns the engine's dump of every surviving key.
    fn load_and_dump(&self, logs: &[u8], db_dir: &Path) -> Result<Vec<u8>, DriverError>;
}

/// The oracle itself behind the engine interface. Running the driver with it
/// checks the harness plumbing end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleEngine;

impl EngineUnderTest for OracleEngine {
    fn name(&self) -> &str {
        "oracle"
    }

    fn load_and_dump(&self, logs: &[u8], _db_dir: &Path) -> Result<Vec<u8>, DriverError> {
        let state = oracle::replay_readers([("engine-input".to_string(), logs)])?;
        let mut dump = Vec::new();
        state.write_dump(&mut dump)?;
        Ok(dump)
    }
}

/// An engine driven through two external commands:
///
/// * `write <args..> <db_dir>` reads the log text on stdin;
/// * `read <args..> <db_dir>` prints the dump on stdout.
///
/// Each command is killed if it runs longer than `timeout`.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    name: String,
    write: CommandLine,
    read: CommandLine,
    timeout: Duration,
}

impl ProcessEngine {
    pub fn new(write: CommandLine, read: CommandLine, timeout: Duration) -> Self {
        Self {
            name: write.program.clone(),
            write,
            read,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.engine_write.clone(),
            settings.engine_read.clone(),
            settings.engine_timeout,
        )
    }

    fn command(&self, cmd: &CommandLine, db_dir: &Path) -> Command {
        let mut c = Command::new(&cmd.program);
        c.args(&cmd.args).arg(db_dir);
        c
    }

    fn timed_out(&self, what: &str) -> DriverError {
        DriverError::Timeout {
            engine: format!("{} ({what})", self.name),
            after: self.timeout,
        }
    }

    /// Waits for `child`, killing it once `started + timeout` has passed.
    fn wait(&self, child: &mut Child, started: Instant, what: &str) -> Result<ExitStatus, DriverError> {
        loop {
            if let Some(status) = child.try_wait()? {
                trace!(command = what, elapsed = ?started.elapsed(), %status, "engine command exited");
                return Ok(status);
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out(what));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Receives the result of a pipe thread within what is left of the
    /// command's time budget.
    ///
    /// The pipe may outlive the child (a background process can inherit it),
    /// so the thread is abandoned rather than joined when time runs out.
    fn pipe_result<T>(
        &self,
        rx: Receiver<io::Result<T>>,
        started: Instant,
        what: &str,
    ) -> Result<io::Result<T>, DriverError> {
        let remaining = self.timeout.saturating_sub(started.elapsed());
        match rx.recv_timeout(remaining) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out(what)),
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::Engine {
                engine: self.name.clone(),
                message: format!("{what} pipe thread panicked"),
            }),
        }
    }

    fn check(&self, status: ExitStatus, what: &str) -> Result<(), DriverError> {
        if status.success() {
            Ok(())
        } else {
            Err(DriverError::Engine {
                engine: self.name.clone(),
                message: format!("{what} command exited with {status}"),
            })
        }
    }

    fn run_write(&self, logs: &[u8], db_dir: &Path) -> Result<(), DriverError> {
        let started = Instant::now();
        let mut child = self
            .command(&self.write, db_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;

        // feed stdin from a separate thread so a stalled child still hits the timeout
        let feeder = child.stdin.take().map(|mut stdin| {
            let logs = logs.to_vec();
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let _ = tx.send(stdin.write_all(&logs));
            });
            rx
        });

        let status = self.wait(&mut child, started, "write")?;
        if let Some(rx) = feeder {
            match self.pipe_result(rx, started, "write")? {
                Ok(()) => {}
                // the child may legitimately exit before draining its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.check(status, "write")
    }

    fn run_read(&self, db_dir: &Path) -> Result<Vec<u8>, DriverError> {
        let started = Instant::now();
        let mut child = self
            .command(&self.read, db_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let collector = child.stdout.take().map(|mut stdout| {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
            });
            rx
        });

        let status = self.wait(&mut child, started, "read")?;
        let dump = match collector {
            Some(rx) => self.pipe_result(rx, started, "read")??,
            None => Vec::new(),
        };
        self.check(status, "read")?;
        Ok(dump)
    }
}

impl EngineUnderTest for ProcessEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_and_dump(&self, logs: &[u8], db_dir: &Path) -> Result<Vec<u8>, DriverError> {
        debug!(engine = %self.name, bytes = logs.len(), db = %db_dir.display(), "loading logs");
        self.run_write(logs, db_dir)?;
        let dump = self.run_read(db_dir)?;
        debug!(engine = %self.name, bytes = dump.len(), "dump collected");
        Ok(dump)
    }
}
