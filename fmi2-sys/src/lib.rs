#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

pub mod fmi2;
pub mod module;

pub use module::{MissingSymbolError, Module, RawSymbol, StaticModule};

#[cfg(feature = "dynamic")]
pub use module::{LoadError, SharedLibrary};
