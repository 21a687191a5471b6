//! The `fmi2-cs` crate implements a Rust client for FMUs (Functional Mockup Units) that follow the
//! FMI 2.0 Co-Simulation interface. See <http://www.fmi-standard.org/>
//!
//! An [`Fmu`] owns the resolved entry points of one FMU binary. Each [`Instance`] created from it
//! tracks the FMI lifecycle and rejects calls the standard forbids in the current state before
//! they reach the FMU.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use fmi2_cs::{CoSimulation as _, Common as _, Fmu, InstantiateOptions};
//!
//! let fmu = Fmu::from_path("binaries/linux64/Adder.so").unwrap();
//! let options = InstantiateOptions::new("{8c4e810f-3df3-4a00-8276-176fa3c9f000}")
//!     .resource_dir("resources")
//!     .unwrap();
//!
//! let mut inst = fmu.instantiate_cs("inst1", &options).unwrap();
//! inst.setup_experiment(None, 0.0, Some(1.0)).unwrap();
//! inst.enter_initialization_mode().unwrap();
//! inst.exit_initialization_mode().unwrap();
//!
//! inst.set_real(&[0, 1], &[1.0, 1.0]).unwrap();
//! let mut time = 0.0;
//! while time < 1.0 {
//!     inst.do_step(time, 0.01, true).unwrap();
//!     time += 0.01;
//! }
//!
//! let mut sum = [0.0];
//! inst.get_real(&[2], &mut sum).unwrap();
//! inst.terminate().unwrap();
//! inst.free_instance().unwrap();
//! ```
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

use std::path::PathBuf;

pub use fmi2_sys as sys;
pub use fmi2_sys::fmi2 as binding;

mod callbacks;
mod import;
pub mod instance;
mod status;

pub use callbacks::CallbackFunctions;
pub use import::{Fmu, InstantiateOptions};
pub use instance::{CoSimulation, Common, FmuState, Instance, LifecycleState, Operation};
pub use status::{Fmi2Error, Fmi2Res, Fmi2Status, Status, StatusKind};

pub type ValueReference = binding::fmi2ValueReference;

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Arguments rejected locally, before any call into the FMU.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidArgument {
    #[error("{values} values given for {refs} value references")]
    LengthMismatch { refs: usize, values: usize },

    #[error("`{operation}` is not allowed in state {state:?}")]
    IllegalState {
        operation: Operation,
        state: LifecycleState,
    },

    #[error("Communication step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),

    #[error("Communication point must be finite, got {0}")]
    InvalidCommunicationPoint(f64),

    #[error("Communication point {current} precedes the end of the previous step at {expected}")]
    NonMonotonicTime { current: f64, expected: f64 },

    #[error("Instance name must not be empty")]
    EmptyInstanceName,

    #[error("FMU state was captured by a different instance")]
    ForeignFmuState,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "dynamic")]
    #[error(transparent)]
    Load(#[from] sys::LoadError),

    #[error(transparent)]
    MissingSymbol(#[from] sys::MissingSymbolError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error(transparent)]
    Fmi2(#[from] Fmi2Error),

    #[error("FMU returned a null component instantiating '{name}'")]
    Instantiation { name: String },

    #[error("TypesPlatform of loaded API ({0}) doesn't match expected (default)")]
    TypesPlatformMismatch(String),

    #[error("FMI version of loaded API ({found}) doesn't match expected ({expected})")]
    FmiVersionMismatch { found: String, expected: String },

    #[error("Unable to form a resource URI from {0:?}")]
    ResourceUri(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nul(#[from] std::ffi::NulError),

    #[error(transparent)]
    Utf8Error(#[from] std::str::Utf8Error),
}

impl Error {
    /// The status reported by the FMU, if this error came from one.
    pub fn fmi2_error(&self) -> Option<Fmi2Error> {
        match self {
            Error::Fmi2(e) => Some(*e),
            _ => None,
        }
    }

    /// The local rejection, if the call never reached the FMU.
    pub fn invalid_argument(&self) -> Option<&InvalidArgument> {
        match self {
            Error::InvalidArgument(e) => Some(e),
            _ => None,
        }
    }
}
