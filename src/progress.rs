//! Rebuild progress reporting.
//!
//! Reports observable progress during `searchsync rebuild` so operators see
//! how far a rebuild has come. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts; structured logs go through `tracing`
//! independently of this.

use std::io::Write;

/// A single progress event for a rebuild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RebuildProgressEvent {
    /// Index settings are being written and existing documents cleared.
    Provisioning,
    /// A page has been submitted. `indexed` is the running document total.
    Page { page: u64, ids: u64, indexed: u64 },
    /// The run ended (successfully or not).
    Finished { indexed: u64 },
}

/// Reports rebuild progress. Implementations write to stderr (human or JSON).
pub trait RebuildProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the sync orchestrator.
    fn report(&self, event: RebuildProgressEvent);
}

/// Human-friendly progress on stderr: "rebuild  page 3  2,500 documents indexed".
pub struct StderrProgress;

impl RebuildProgressReporter for StderrProgress {
    fn report(&self, event: RebuildProgressEvent) {
        let line = match &event {
            RebuildProgressEvent::Provisioning => "rebuild  provisioning index...\n".to_string(),
            RebuildProgressEvent::Page { page, ids, indexed } => format!(
                "rebuild  page {}  {} ids  {} documents indexed\n",
                page,
                format_number(*ids),
                format_number(*indexed)
            ),
            RebuildProgressEvent::Finished { indexed } => {
                format!("rebuild  done  {} documents indexed\n", format_number(*indexed))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RebuildProgressReporter for JsonProgress {
    fn report(&self, event: RebuildProgressEvent) {
        let obj = match &event {
            RebuildProgressEvent::Provisioning => serde_json::json!({
                "event": "progress",
                "phase": "provisioning"
            }),
            RebuildProgressEvent::Page { page, ids, indexed } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "page": page,
                "ids": ids,
                "indexed": indexed
            }),
            RebuildProgressEvent::Finished { indexed } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "indexed": indexed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RebuildProgressReporter for NoProgress {
    fn report(&self, _event: RebuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` flag value; `auto` defers to [`default_for_tty`](Self::default_for_tty).
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "auto" => Some(Self::default_for_tty()),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            "off" => Some(ProgressMode::Off),
            _ => None,
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn RebuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
