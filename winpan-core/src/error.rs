use thiserror::Error;

use crate::process::Pid;

/// Arena allocation failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },
}

/// Failures while building or querying a process tree.
///
/// Every variant is a sizing or environment problem rather than a transient
/// race; processes vanishing mid-scan are never reported here.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process index full ({capacity} slots) while inserting pid {pid}")]
    IndexFull { pid: Pid, capacity: usize },

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("no arena space left for a {nodes} pid descendant buffer")]
    DescendantBuffer { nodes: usize },

    #[error("process source unavailable: {0}")]
    Source(#[from] std::io::Error),
}

/// Reasons a `/proc/<pid>/stat` line could not be understood.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StatParseError {
    #[error("missing command name delimiter")]
    MissingComm,
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Invalid channel volume sets.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VolumeError {
    #[error("{0} channels exceed the supported maximum")]
    TooManyChannels(usize),
}
