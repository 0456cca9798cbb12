use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use tablewright_common::{Error, Result};
use tracing::{info, warn};

use crate::version::Version;

/// Log sink failures tolerated per run before writes stop being attempted.
const MAX_LOG_ERRORS: u32 = 3;

pub const WORK_IN_PROGRESS: &str = "Work in progress...";

/// Something the operator should see while a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// A new progress area was opened (one per version step).
    AreaOpened { area: &'a str },
    /// Status line for the current area, with time since the run started.
    Message {
        area: &'a str,
        text: &'a str,
        elapsed: &'a str,
    },
    Title(&'a str),
    Warning { text: &'a str, emphasized: bool },
}

/// Where progress is rendered.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent<'_>);
}

/// Append-only audit log, one stream per `name`. Returns whether the line
/// was written.
pub trait LogSink {
    fn write(&mut self, name: &str, message: &str) -> bool;
}

/// Renders progress on stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::AreaOpened { area } => println!("[{area}] {WORK_IN_PROGRESS}"),
            ProgressEvent::Message {
                area,
                text,
                elapsed,
            } => {
                if area.is_empty() {
                    println!("{text} ({elapsed})");
                } else {
                    println!("[{area}] {text} ({elapsed})");
                }
            }
            ProgressEvent::Title(title) => {
                println!();
                println!("{title}");
                println!("{}", "-".repeat(title.chars().count()));
            }
            ProgressEvent::Warning { text, emphasized } => {
                if emphasized {
                    println!("!! {text} !!");
                } else {
                    println!("Warning: {text}");
                }
            }
        }
    }
}

/// Writes `<dir>/<name>.log`, one timestamped line per message.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn append(&self, name: &str, message: &str) -> Result<()> {
        let path = self.dir.join(format!("{name}.log"));
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::LogWrite(format!("failed to create {}: {e}", self.dir.display())))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::LogWrite(format!("failed to open {}: {e}", path.display())))?;
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "{now} {message}")
            .map_err(|e| Error::LogWrite(format!("failed to write {}: {e}", path.display())))
    }
}

impl LogSink for FileLogSink {
    fn write(&mut self, name: &str, message: &str) -> bool {
        match self.append(name, message) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }
}

/// Sends audit lines to `tracing` instead of files. Used by dry runs.
#[derive(Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(&mut self, name: &str, message: &str) -> bool {
        info!(target: "tablewright::audit", log = name, "{message}");
        true
    }
}

struct PendingMessage {
    since: Instant,
    text: String,
}

/// Operator-facing progress and the per-version audit log.
///
/// Each displayed message stays "in progress" until the next one arrives;
/// at that point its duration is written to the log.
pub struct ProgressReporter {
    version: Version,
    started: Instant,
    area: String,
    last_message: Option<PendingMessage>,
    log_errors: u32,
    sink: Box<dyn ProgressSink>,
    log: Box<dyn LogSink>,
}

impl ProgressReporter {
    pub fn new(
        version: impl Into<Version>,
        sink: Box<dyn ProgressSink>,
        log: Box<dyn LogSink>,
    ) -> Self {
        Self {
            version: version.into(),
            started: Instant::now(),
            area: String::new(),
            last_message: None,
            log_errors: 0,
            sink,
            log,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Switch to another version step and give it its own progress area.
    pub fn set_version(&mut self, version: impl Into<Version>) {
        self.flush_log_display_message();
        self.version = version.into();
        let area = format!("migration_message_{}", self.version);
        self.add_new_message_area(&area);
    }

    pub fn add_new_message_area(&mut self, area: &str) {
        if area == self.area {
            self.display_message(WORK_IN_PROGRESS);
        } else {
            self.area = area.to_string();
            self.sink.emit(ProgressEvent::AreaOpened { area });
            self.flush_log_display_message();
        }
    }

    /// Log how long the previous message was on screen.
    pub fn flush_log_display_message(&mut self) {
        if let Some(last) = self.last_message.take() {
            let took = format_elapsed(last.since.elapsed().as_secs());
            self.log(&format!("{took} for \"{}\"", last.text), false);
        }
    }

    pub fn display_message(&mut self, text: &str) {
        let elapsed = format_elapsed(self.started.elapsed().as_secs());
        self.sink.emit(ProgressEvent::Message {
            area: &self.area,
            text,
            elapsed: &elapsed,
        });

        self.flush_log_display_message();
        self.last_message = Some(PendingMessage {
            since: Instant::now(),
            text: text.to_string(),
        });
    }

    pub fn display_title(&mut self, title: &str) {
        self.sink.emit(ProgressEvent::Title(title));
    }

    pub fn display_warning(&mut self, text: &str, emphasized: bool) {
        self.sink.emit(ProgressEvent::Warning { text, emphasized });
        self.log(text, true);
    }

    /// Append to `migration_to_<version>` or, for warnings,
    /// `warning_during_migration_to_<version>`.
    pub fn log(&mut self, message: &str, warning: bool) {
        if self.log_errors >= MAX_LOG_ERRORS {
            return;
        }
        let name = if warning {
            format!("warning_during_migration_to_{}", self.version)
        } else {
            format!("migration_to_{}", self.version)
        };
        if !self.log.write(&name, message) {
            self.log_errors += 1;
        }
    }

    pub fn log_errors(&self) -> u32 {
        self.log_errors
    }
}

/// Human-readable duration, e.g. `1 minute 4 seconds`.
pub fn format_elapsed(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(unit(days, "day"));
    }
    if days > 0 || hours > 0 {
        parts.push(unit(hours, "hour"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(unit(minutes, "minute"));
    }
    parts.push(unit(secs, "second"));
    parts.join(" ")
}

fn unit(n: u64, name: &str) -> String {
    if n == 1 {
        format!("{n} {name}")
    } else {
        format!("{n} {name}s")
    }
}
