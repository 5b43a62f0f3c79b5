mod backend;
mod controller;
mod error;
mod panning;
mod shutdown;

pub use self::{
    backend::{
        AudioEvent, AudioServer, ClientIndex, EventKind, Facility, WindowEvent, WindowId,
        WindowSystem,
    },
    controller::{Controller, IterationReport},
    error::EngineError,
    panning::{pan, Balance},
    shutdown::shutdown_signal,
};

pub mod prelude {
    pub use super::{AudioServer, Controller, EngineError, WindowSystem};
}
