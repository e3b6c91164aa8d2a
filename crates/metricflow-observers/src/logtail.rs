//! System-log tailing via subprocess
//!
//! Spawns a log-producing command (`journalctl --follow` by default), reads
//! its stdout on a dedicated thread, and forwards warning and error lines
//! to a callback and the logging sink. The reader exits when the child's
//! stdout closes; release kills the child to force that.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::Context;
use tracing::{debug, error, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::IHostContext;

const TARGET: &str = "metricflow::logtail";

/// Receives each interesting log line as captured.
pub type LogLineCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct LogTailObserver {
    command: Vec<String>,
    callback: Option<LogLineCallback>,
    installed: Mutex<bool>,
    child: Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LogTailObserver {
    /// Tail the system journal.
    pub fn new() -> Self {
        Self::with_command(
            ["journalctl", "--follow", "--no-pager", "--priority", "warning"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Tail the output of an arbitrary command. First element is the
    /// program, the rest its arguments.
    pub fn with_command(command: Vec<String>) -> Self {
        Self {
            command,
            callback: None,
            installed: Mutex::new(false),
            child: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Forward captured lines to `callback` in addition to logging them.
    pub fn with_callback(mut self, callback: LogLineCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl Default for LogTailObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for LogTailObserver {
    fn name(&self) -> &'static str {
        "log_tail_observer"
    }

    fn install(&self, _host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "log tail observer already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let result = self.spawn_tail();
        if result.is_err() {
            *self.installed.lock().unwrap_or_else(|e| e.into_inner()) = false;
        }
        result
    }

    fn release(&self) {
        {
            let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
            if !*installed {
                return;
            }
            *installed = false;
        }

        if let Some(mut child) = self.child.lock().unwrap_or_else(|e| e.into_inner()).take() {
            // Closes the pipe, which ends the reader thread's line loop.
            if let Err(e) = child.kill() {
                debug!(target: TARGET, error = %e, "log tail child already gone");
            }
            let _ = child.wait();
        }
        if let Some(handle) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if handle.join().is_err() {
                error!(target: TARGET, "log tail reader panicked during shutdown");
            }
        }
        debug!(target: TARGET, "log tail observer released");
    }
}

impl LogTailObserver {
    fn spawn_tail(&self) -> Result<(), ModuleError> {
        let (program, args) = self
            .command
            .split_first()
            .context("log tail command is empty")
            .map_err(ModuleError::Adapter)?;

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning log tail command {program}"))
            .map_err(ModuleError::Adapter)?;

        let stdout = child
            .stdout
            .take()
            .context("log tail child has no stdout")
            .map_err(ModuleError::Adapter)?;

        let callback = self.callback.clone();
        let spawned = std::thread::Builder::new()
            .name("metricflow-logtail".into())
            .spawn(move || read_lines(stdout, callback));

        match spawned {
            Ok(handle) => {
                *self.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
                *self.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                debug!(target: TARGET, program = program.as_str(), "log tail observer installed");
                Ok(())
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ModuleError::Spawn {
                    thread: "metricflow-logtail",
                    source,
                })
            }
        }
    }
}

fn read_lines(stdout: impl std::io::Read, callback: Option<LogLineCallback>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(target: TARGET, error = %e, "log tail read ended");
                break;
            }
        };
        if !line_is_interesting(&line) {
            continue;
        }
        warn!(target: TARGET, line = line.as_str(), "host log line captured");
        if let Some(cb) = &callback {
            (**cb)(&line);
        }
    }
    debug!(target: TARGET, "log tail reader exiting");
}

/// Warning and error lines only; the feed is for anomalies, not volume.
fn line_is_interesting(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("error")
        || lower.contains("warn")
        || lower.contains("fatal")
        || lower.contains("panic")
}
