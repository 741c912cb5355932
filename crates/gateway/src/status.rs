//! Per-instance status heartbeat files.
//!
//! Each gateway process writes `~/.switchyard/status/<port>.json` on every
//! material state change and deletes it on clean shutdown. A companion
//! reader enumerates the directory across a fleet of instances and probes
//! whether each recorded pid is still alive (and not a zombie, where the
//! platform lets us tell), so stale files from crashed processes are
//! surfaced rather than trusted.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Directory under the home directory holding the status files.
const STATUS_DIR: &str = ".switchyard/status";

/// The heartbeat document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDocument {
    pub port: u16,
    pub pid: u32,
    pub provider: String,
    pub model: String,
    pub requests: u64,
    pub errors: u64,
    pub started_at: String,
    pub updated_at: String,
}

/// One fleet entry as seen by the reader.
#[derive(Debug, Clone, Serialize)]
pub struct FleetEntry {
    pub status: StatusDocument,
    pub alive: bool,
}

/// Writer handle for this instance's status file.
pub(crate) struct StatusPublisher {
    path: PathBuf,
}

impl StatusPublisher {
    /// Create the status directory and the publisher for `port`.
    pub(crate) fn new(port: u16) -> io::Result<Self> {
        let dir = status_dir()?;
        fs::create_dir_all(&dir)?;

        Ok(Self {
            path: dir.join(format!("{port}.json")),
        })
    }

    /// Rewrite the status file. Written to a sibling temp file first and
    /// renamed, so readers never observe a half-written document.
    pub(crate) fn publish(&self, document: &StatusDocument) -> io::Result<()> {
        let serialized = serde_json::to_vec_pretty(document).map_err(io::Error::other)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &self.path)
    }

    /// Delete the status file on clean shutdown.
    pub(crate) fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            log::warn!("failed to remove status file {}: {e}", self.path.display());
        }
    }
}

/// Enumerate every instance's status file and probe pid liveness.
pub fn read_fleet() -> Vec<FleetEntry> {
    let Ok(dir) = status_dir() else {
        return Vec::new();
    };

    read_fleet_from(&dir)
}

fn read_fleet_from(dir: &Path) -> Vec<FleetEntry> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut fleet = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let Ok(raw) = fs::read(&path) else {
            continue;
        };

        match serde_json::from_slice::<StatusDocument>(&raw) {
            Ok(status) => {
                let alive = pid_alive(status.pid);
                fleet.push(FleetEntry { status, alive });
            }
            Err(e) => {
                log::debug!("skipping unreadable status file {}: {e}", path.display());
            }
        }
    }

    fleet.sort_by_key(|entry| entry.status.port);
    fleet
}

fn status_dir() -> io::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME is not set"))?;

    Ok(home.join(STATUS_DIR))
}

/// Whether `pid` refers to a live, non-zombie process.
#[cfg(target_os = "linux")]
fn pid_alive(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };

    // State is the first field after the parenthesized command name, which
    // may itself contain spaces and parentheses.
    let Some((_, after_comm)) = stat.rsplit_once(')') else {
        return false;
    };

    !matches!(after_comm.trim_start().chars().next(), Some('Z') | None)
}

/// Without /proc we can only check for existence via a zero signal.
#[cfg(not(target_os = "linux"))]
fn pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists() || pid == std::process::id()
}
