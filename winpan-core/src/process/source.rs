//! Process-information sources.
//!
//! - [`ProcFs`]: the live `/proc` filesystem (root path configurable)
//! - [`MemorySource`]: an in-memory process table for tests and simulation

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::Pid;
use crate::error::StatParseError;

/// A point-in-time view of the system's process table.
pub trait ProcessSource {
    /// Lists every pid present when called.
    ///
    /// An error here means the source itself is unusable.
    fn pids(&self) -> io::Result<Vec<Pid>>;

    /// Reads the single-line stat record of `pid`.
    ///
    /// An error means the process is gone and is never fatal to a scan.
    fn stat_line(&self, pid: Pid) -> io::Result<String>;
}

impl<S: ProcessSource + ?Sized> ProcessSource for &S {
    fn pids(&self) -> io::Result<Vec<Pid>> {
        (**self).pids()
    }

    fn stat_line(&self, pid: Pid) -> io::Result<String> {
        (**self).stat_line(pid)
    }
}

impl<S: ProcessSource + ?Sized> ProcessSource for Box<S> {
    fn pids(&self) -> io::Result<Vec<Pid>> {
        (**self).pids()
    }

    fn stat_line(&self, pid: Pid) -> io::Result<String> {
        (**self).stat_line(pid)
    }
}

/// The leading fields of a `/proc/<pid>/stat` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatFields<'a> {
    pub pid: Pid,
    pub comm: &'a str,
    pub state: char,
    pub ppid: Pid,
}

/// Parses `pid (comm) state ppid ...`.
///
/// `comm` may itself contain spaces and parentheses, so the name is taken up
/// to the last `)` on the line.
pub fn parse_stat(line: &str) -> Result<StatFields<'_>, StatParseError> {
    let open = line.find('(').ok_or(StatParseError::MissingComm)?;
    let close = line.rfind(')').ok_or(StatParseError::MissingComm)?;
    if close < open {
        return Err(StatParseError::MissingComm);
    }

    let pid = parse_pid("pid", line[..open].trim())?;
    let comm = &line[open + 1..close];

    let mut rest = line[close + 1..].split_whitespace();
    let state = rest
        .next()
        .and_then(|s| s.chars().next())
        .ok_or(StatParseError::MissingField("state"))?;
    let ppid = rest.next().ok_or(StatParseError::MissingField("ppid"))?;
    let ppid = parse_pid("ppid", ppid)?;

    Ok(StatFields {
        pid,
        comm,
        state,
        ppid,
    })
}

fn parse_pid(field: &'static str, value: &str) -> Result<Pid, StatParseError> {
    value
        .parse::<Pid>()
        .map_err(|_| StatParseError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn is_numeric(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// The live process-information filesystem.
#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcessSource for ProcFs {
    fn pids(&self) -> io::Result<Vec<Pid>> {
        let mut pids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            // Entries can disappear while the directory is being listed.
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_numeric(name) {
                continue;
            }
            match name.parse::<Pid>() {
                Ok(pid) => pids.push(pid),
                Err(_) => trace!(name, "ignoring out-of-range pid directory"),
            }
        }
        // procfs lists pids ascending; other directory trees do not.
        pids.sort_unstable();
        Ok(pids)
    }

    fn stat_line(&self, pid: Pid) -> io::Result<String> {
        fs::read_to_string(self.root.join(pid.to_string()).join("stat"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct MemoryEntry {
    ppid: Pid,
    comm: String,
}

/// In-memory process table.
///
/// Processes marked with [`MemorySource::vanish`] are still listed by
/// [`ProcessSource::pids`] but fail to open, the same way a process that
/// exits between `readdir` and `open` behaves on `/proc`.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    entries: BTreeMap<Pid, MemoryEntry>,
    vanished: BTreeSet<Pid>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(pid, ppid)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Pid, Pid)>,
    {
        let mut source = Self::new();
        for (pid, ppid) in pairs {
            source.spawn(pid, ppid, format!("proc-{pid}"));
        }
        source
    }

    /// Adds or replaces a process.
    pub fn spawn(&mut self, pid: Pid, ppid: Pid, comm: impl Into<String>) {
        self.vanished.remove(&pid);
        self.entries.insert(
            pid,
            MemoryEntry {
                ppid,
                comm: comm.into(),
            },
        );
    }

    /// Removes a process entirely.
    pub fn exit(&mut self, pid: Pid) -> bool {
        self.vanished.remove(&pid);
        self.entries.remove(&pid).is_some()
    }

    /// Keeps `pid` listed but makes its stat record unreadable.
    pub fn vanish(&mut self, pid: Pid) {
        if self.entries.contains_key(&pid) {
            self.vanished.insert(pid);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProcessSource for MemorySource {
    fn pids(&self) -> io::Result<Vec<Pid>> {
        Ok(self.entries.keys().copied().collect())
    }

    fn stat_line(&self, pid: Pid) -> io::Result<String> {
        if self.vanished.contains(&pid) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "process exited"));
        }
        let entry = self
            .entries
            .get(&pid)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such process"))?;
        Ok(format!(
            "{pid} ({}) S {} {pid} {pid} 0 -1 4194560 0 0 0 0 0 0 0 0 20 0 1 0\n",
            entry.comm, entry.ppid
        ))
    }
}
