use std::{
    ffi::CStr,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    binding::{self, Fmi2Binding},
    instance::Instance,
    sys::Module,
    CallbackFunctions, Error,
};

/// One loaded FMU binary and its resolved entry points.
///
/// Instances borrow the `Fmu`, so the binary can only be released after every instance created
/// from it has been freed.
pub struct Fmu {
    binding: Fmi2Binding,
    pub(crate) live_instances: AtomicUsize,
}

/// Parameters passed through to `fmi2Instantiate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstantiateOptions {
    /// Must match the `guid` attribute of the FMU's modelDescription.xml
    pub guid: String,
    /// URI of the unzipped FMU's `resources` directory
    pub resource_uri: String,
    /// Whether the FMU may show a user interface
    pub visible: bool,
    /// Whether the FMU should report debug messages through the logger callback
    pub logging_on: bool,
}

impl InstantiateOptions {
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            ..Default::default()
        }
    }

    pub fn resource_uri(mut self, uri: impl Into<String>) -> Self {
        self.resource_uri = uri.into();
        self
    }

    /// Use the `file://` URI of `dir` as resource location.
    ///
    /// As per the FMI standard, the resource location is a IETF URI to the resources directory.
    pub fn resource_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = std::path::absolute(dir.as_ref())?;
        let url = url::Url::from_directory_path(&dir).map_err(|_| Error::ResourceUri(dir))?;
        self.resource_uri = url.into();
        Ok(self)
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn logging_on(mut self, logging_on: bool) -> Self {
        self.logging_on = logging_on;
        self
    }
}

/// Borrow a string returned by the FMU; null reads as empty.
pub(crate) unsafe fn fmi_str<'a>(ptr: *const binding::fmi2Char) -> Result<&'a str, Error> {
    if ptr.is_null() {
        return Ok("");
    }
    Ok(unsafe { CStr::from_ptr(ptr) }.to_str()?)
}

/// Copy the strings returned by the FMU into `values`.
///
/// Every pointer is decoded before `values` is touched, so a decoding error leaves it unchanged.
pub(crate) unsafe fn copy_fmi_strs(
    raw: &[binding::fmi2String],
    values: &mut [String],
) -> Result<(), Error> {
    let decoded = raw
        .iter()
        .map(|&ptr| unsafe { fmi_str(ptr) }.map(str::to_owned))
        .collect::<Result<Vec<_>, _>>()?;
    for (value, s) in values.iter_mut().zip(decoded) {
        *value = s;
    }
    Ok(())
}

impl Fmu {
    /// Open the FMU shared library at `path` and resolve its entry points.
    #[cfg(feature = "dynamic")]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        log::debug!(
            "Loading FMU binary {:?} with {} {}",
            path.as_ref(),
            crate::built_info::PKG_NAME,
            crate::built_info::PKG_VERSION
        );
        let library = crate::sys::SharedLibrary::open(path)?;
        Self::from_module(library)
    }

    /// Resolve the entry points of an already loaded module.
    pub fn from_module(module: impl Module + 'static) -> Result<Self, Error> {
        let binding = Fmi2Binding::new(Box::new(module))?;
        log::trace!("Resolved {binding:?}");
        Ok(Self {
            binding,
            live_instances: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub(crate) fn binding(&self) -> &Fmi2Binding {
        &self.binding
    }

    /// The FMI-standard version string
    pub fn get_version(&self) -> Result<&str, Error> {
        unsafe { fmi_str(self.binding.fmi2GetVersion()) }
    }

    pub fn get_types_platform(&self) -> Result<&str, Error> {
        unsafe { fmi_str(self.binding.fmi2GetTypesPlatform()) }
    }

    /// Check the internal consistency of the FMU by comparing the TypesPlatform and FMI versions
    /// reported by the library with the ones this client was built for.
    pub fn check_consistency(&self) -> Result<(), Error> {
        let types_platform = self.get_types_platform()?;
        if types_platform != binding::fmi2TypesPlatform {
            return Err(Error::TypesPlatformMismatch(types_platform.to_owned()));
        }

        let fmi_version = self.get_version()?;
        if fmi_version != binding::fmi2Version {
            return Err(Error::FmiVersionMismatch {
                found: fmi_version.to_owned(),
                expected: binding::fmi2Version.to_owned(),
            });
        }

        Ok(())
    }

    /// Number of instances created from this FMU that have not been dropped yet.
    pub fn live_instances(&self) -> usize {
        self.live_instances.load(Ordering::Acquire)
    }

    /// Create a new instance of the FMU for Co-Simulation, logging through the `log` crate.
    pub fn instantiate_cs(
        &self,
        instance_name: &str,
        options: &InstantiateOptions,
    ) -> Result<Instance<'_>, Error> {
        Instance::new(self, instance_name, options, CallbackFunctions::default())
    }

    /// Create a new instance of the FMU for Co-Simulation with custom callbacks.
    pub fn instantiate_cs_with_callbacks(
        &self,
        instance_name: &str,
        options: &InstantiateOptions,
        callbacks: CallbackFunctions,
    ) -> Result<Instance<'_>, Error> {
        Instance::new(self, instance_name, options, callbacks)
    }
}

impl std::fmt::Debug for Fmu {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Fmu")
            .field("module", &self.binding.module().describe())
            .field("live_instances", &self.live_instances())
            .finish()
    }
}
