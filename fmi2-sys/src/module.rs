//! Loading of FMU binaries and lookup of their entry points by name.
//!
//! A [`Module`] is whatever owns the code of an FMU: a shared library opened at runtime
//! ([`SharedLibrary`], POSIX `dlopen` or Windows `LoadLibraryEx` depending on the target) or a
//! table of functions already linked into the host process ([`StaticModule`]). Code above this
//! layer only ever sees `dyn Module`.

use std::{collections::HashMap, ffi::c_void, fmt, ptr::NonNull};

#[cfg(feature = "dynamic")]
pub use shared::SharedLibrary;

#[cfg(feature = "dynamic")]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to open module {path:?}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Unable to close module {path:?}: {source}")]
    Close {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Entry point `{name}` not found in {module}")]
pub struct MissingSymbolError {
    pub name: String,
    pub module: String,
}

/// Non-null, untyped address of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSymbol(NonNull<c_void>);

// Code addresses carry no thread affinity.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    /// Returns `None` for a null address.
    pub fn new(address: *const c_void) -> Option<Self> {
        NonNull::new(address as *mut c_void).map(Self)
    }

    #[inline]
    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

/// A loaded FMU binary.
///
/// # Safety
///
/// Every address returned by [`Module::lookup`] for an FMI 2.0 entry point name must point to a
/// function with the C signature the standard defines for that name, and must remain valid
/// until the module is dropped.
pub unsafe trait Module: fmt::Debug + Send + Sync {
    /// Human-readable identification, used in error messages and logs.
    fn describe(&self) -> String;

    /// Look up an entry point by its exported name.
    fn lookup(&self, name: &str) -> Result<RawSymbol, MissingSymbolError>;
}

/// Entry points linked into the host process, registered by name.
#[derive(Debug, Default)]
pub struct StaticModule {
    name: String,
    symbols: HashMap<String, RawSymbol>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    /// Register `address` under `name`. Null addresses are ignored.
    ///
    /// # Safety
    ///
    /// `address` must be a function with the FMI 2.0 signature of `name`, valid for the rest of
    /// the process.
    pub unsafe fn insert(&mut self, name: &str, address: *const c_void) -> &mut Self {
        match RawSymbol::new(address) {
            Some(symbol) => {
                self.symbols.insert(name.to_owned(), symbol);
            }
            None => log::warn!("Ignoring null address registered for `{name}`"),
        }
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<RawSymbol> {
        self.symbols.remove(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

unsafe impl Module for StaticModule {
    fn describe(&self) -> String {
        format!("static module '{}'", self.name)
    }

    fn lookup(&self, name: &str) -> Result<RawSymbol, MissingSymbolError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| MissingSymbolError {
                name: name.to_owned(),
                module: self.describe(),
            })
    }
}

#[cfg(feature = "dynamic")]
mod shared {
    use std::{
        ffi::c_void,
        path::{Path, PathBuf},
    };

    #[cfg(unix)]
    use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};
    #[cfg(windows)]
    use libloading::os::windows::{Library, LOAD_WITH_ALTERED_SEARCH_PATH};

    use super::{LoadError, MissingSymbolError, Module, RawSymbol};

    /// A shared library opened at runtime.
    ///
    /// The library is closed exactly once: either by [`SharedLibrary::close`], which reports
    /// failures, or on drop, which logs them.
    #[derive(Debug)]
    pub struct SharedLibrary {
        path: PathBuf,
        library: Option<Library>,
    }

    #[cfg(unix)]
    unsafe fn open_library(path: &Path) -> Result<Library, libloading::Error> {
        unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }
    }

    // Dependencies shipped next to the FMU binary must resolve from its own directory.
    #[cfg(windows)]
    unsafe fn open_library(path: &Path) -> Result<Library, libloading::Error> {
        unsafe { Library::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH) }
    }

    impl SharedLibrary {
        /// Open the shared library at `path`, running its initialisers.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
            let path = path.as_ref().to_path_buf();
            log::debug!("Opening module {path:?}");
            let library = unsafe { open_library(&path) }.map_err(|source| LoadError::Open {
                path: path.clone(),
                source,
            })?;
            Ok(Self {
                path,
                library: Some(library),
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Close the library, reporting any failure from the OS loader.
        pub fn close(mut self) -> Result<(), LoadError> {
            match self.library.take() {
                Some(library) => {
                    log::debug!("Closing module {:?}", self.path);
                    library.close().map_err(|source| LoadError::Close {
                        path: self.path.clone(),
                        source,
                    })
                }
                None => Ok(()),
            }
        }
    }

    impl Drop for SharedLibrary {
        fn drop(&mut self) {
            if let Some(library) = self.library.take() {
                log::debug!("Closing module {:?}", self.path);
                if let Err(e) = library.close() {
                    log::warn!("Error closing module {:?}: {e}", self.path);
                }
            }
        }
    }

    unsafe impl Module for SharedLibrary {
        fn describe(&self) -> String {
            self.path.display().to_string()
        }

        fn lookup(&self, name: &str) -> Result<RawSymbol, MissingSymbolError> {
            let missing = || MissingSymbolError {
                name: name.to_owned(),
                module: self.describe(),
            };
            let library = self.library.as_ref().ok_or_else(missing)?;
            let symbol = unsafe { library.get::<*const c_void>(name.as_bytes()) }.map_err(|e| {
                log::trace!("Lookup of `{name}` failed: {e}");
                missing()
            })?;
            RawSymbol::new(*symbol).ok_or_else(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn placeholder() {}

    #[test_log::test]
    fn test_static_lookup() {
        let mut module = StaticModule::new("test");
        unsafe {
            module
                .insert("fmi2GetVersion", placeholder as *const c_void)
                .insert("fmi2Reset", std::ptr::null());
        }
        assert_eq!(module.len(), 1);

        let symbol = module.lookup("fmi2GetVersion").unwrap();
        assert_eq!(symbol.as_ptr(), placeholder as *const c_void);

        let err = module.lookup("fmi2Reset").unwrap_err();
        assert_eq!(err.name, "fmi2Reset");
        assert_eq!(err.module, "static module 'test'");

        assert!(module.remove("fmi2GetVersion").is_some());
        assert!(module.is_empty());
    }

    #[cfg(feature = "dynamic")]
    #[test_log::test]
    fn test_open_missing_library() {
        let err = SharedLibrary::open("/nonexistent/libmissing_fmu.so").unwrap_err();
        match &err {
            LoadError::Open { path, .. } => {
                assert_eq!(path, std::path::Path::new("/nonexistent/libmissing_fmu.so"))
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("libmissing_fmu"));
    }
}
