//! # winpan-engine
//!
//! Event loop that pans each application's audio streams by the horizontal
//! position of its window.

pub mod engine;

pub use engine::{
    shutdown_signal, AudioEvent, AudioServer, Balance, ClientIndex, Controller, EngineError,
    EventKind, Facility, IterationReport, WindowEvent, WindowId, WindowSystem, pan,
};
