//! The resolved FMI 2.0 co-simulation dispatch table.

use std::ffi::c_void;

use super::*;
use crate::module::{MissingSymbolError, Module};

/// Generates [`Fmi2Binding`] from the list of entry points: one typed fn-pointer field and one
/// `unsafe` call wrapper per entry, the [`Fmi2Binding::SYMBOLS`] list, and a single resolution
/// routine that fails on the first missing name.
macro_rules! fmi2_binding {
    ($(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
    )*) => {
        /// Typed entry points of one loaded FMU binary.
        ///
        /// The table owns its [`Module`], so none of the entry points can outlive the code they
        /// point into. The module is released after the table itself.
        pub struct Fmi2Binding {
            $($name: unsafe extern "C" fn($($ty),*) $(-> $ret)?,)*
            module: Box<dyn Module>,
        }

        #[allow(clippy::too_many_arguments, clippy::missing_safety_doc)]
        impl Fmi2Binding {
            /// Names of all entry points a co-simulation FMU must export.
            pub const SYMBOLS: &'static [&'static str] = &[$(stringify!($name)),*];

            /// Resolve every entry point from `module`.
            pub fn new(module: Box<dyn Module>) -> Result<Self, MissingSymbolError> {
                log::trace!(
                    "Resolving {} entry points from {}",
                    Self::SYMBOLS.len(),
                    module.describe()
                );
                $(
                    let $name = {
                        let symbol = module.lookup(stringify!($name)).inspect_err(|e| {
                            log::error!("{e}");
                        })?;
                        // Module guarantees the address has the signature of this name.
                        unsafe {
                            std::mem::transmute::<*const c_void, unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                                symbol.as_ptr(),
                            )
                        }
                    };
                )*
                Ok(Self { $($name,)* module })
            }

            $(
                $(#[$meta])*
                #[inline]
                pub unsafe fn $name(&self, $($arg: $ty),*) $(-> $ret)? {
                    unsafe { (self.$name)($($arg),*) }
                }
            )*
        }
    };
}

fmi2_binding! {
    fn fmi2GetTypesPlatform() -> *const fmi2Char;
    fn fmi2GetVersion() -> *const fmi2Char;
    fn fmi2SetDebugLogging(
        c: fmi2Component,
        loggingOn: fmi2Boolean,
        nCategories: usize,
        categories: *const fmi2String,
    ) -> fmi2Status;

    fn fmi2Instantiate(
        instanceName: fmi2String,
        fmuType: fmi2Type,
        fmuGUID: fmi2String,
        fmuResourceLocation: fmi2String,
        functions: *const fmi2CallbackFunctions,
        visible: fmi2Boolean,
        loggingOn: fmi2Boolean,
    ) -> fmi2Component;
    fn fmi2FreeInstance(c: fmi2Component);

    fn fmi2SetupExperiment(
        c: fmi2Component,
        toleranceDefined: fmi2Boolean,
        tolerance: fmi2Real,
        startTime: fmi2Real,
        stopTimeDefined: fmi2Boolean,
        stopTime: fmi2Real,
    ) -> fmi2Status;
    fn fmi2EnterInitializationMode(c: fmi2Component) -> fmi2Status;
    fn fmi2ExitInitializationMode(c: fmi2Component) -> fmi2Status;
    fn fmi2Terminate(c: fmi2Component) -> fmi2Status;
    fn fmi2Reset(c: fmi2Component) -> fmi2Status;

    fn fmi2GetReal(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *mut fmi2Real,
    ) -> fmi2Status;
    fn fmi2GetInteger(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *mut fmi2Integer,
    ) -> fmi2Status;
    fn fmi2GetBoolean(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *mut fmi2Boolean,
    ) -> fmi2Status;
    fn fmi2GetString(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *mut fmi2String,
    ) -> fmi2Status;

    fn fmi2SetReal(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *const fmi2Real,
    ) -> fmi2Status;
    fn fmi2SetInteger(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *const fmi2Integer,
    ) -> fmi2Status;
    fn fmi2SetBoolean(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *const fmi2Boolean,
    ) -> fmi2Status;
    fn fmi2SetString(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        value: *const fmi2String,
    ) -> fmi2Status;

    fn fmi2GetFMUstate(c: fmi2Component, FMUstate: *mut fmi2FMUstate) -> fmi2Status;
    fn fmi2SetFMUstate(c: fmi2Component, FMUstate: fmi2FMUstate) -> fmi2Status;
    fn fmi2FreeFMUstate(c: fmi2Component, FMUstate: *mut fmi2FMUstate) -> fmi2Status;
    fn fmi2SerializedFMUstateSize(
        c: fmi2Component,
        FMUstate: fmi2FMUstate,
        size: *mut usize,
    ) -> fmi2Status;
    fn fmi2SerializeFMUstate(
        c: fmi2Component,
        FMUstate: fmi2FMUstate,
        serializedState: *mut fmi2Byte,
        size: usize,
    ) -> fmi2Status;
    fn fmi2DeSerializeFMUstate(
        c: fmi2Component,
        serializedState: *const fmi2Byte,
        size: usize,
        FMUstate: *mut fmi2FMUstate,
    ) -> fmi2Status;

    fn fmi2GetDirectionalDerivative(
        c: fmi2Component,
        vUnknown_ref: *const fmi2ValueReference,
        nUnknown: usize,
        vKnown_ref: *const fmi2ValueReference,
        nKnown: usize,
        dvKnown: *const fmi2Real,
        dvUnknown: *mut fmi2Real,
    ) -> fmi2Status;
    fn fmi2SetRealInputDerivatives(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        order: *const fmi2Integer,
        value: *const fmi2Real,
    ) -> fmi2Status;
    fn fmi2GetRealOutputDerivatives(
        c: fmi2Component,
        vr: *const fmi2ValueReference,
        nvr: usize,
        order: *const fmi2Integer,
        value: *mut fmi2Real,
    ) -> fmi2Status;

    fn fmi2DoStep(
        c: fmi2Component,
        currentCommunicationPoint: fmi2Real,
        communicationStepSize: fmi2Real,
        noSetFMUStatePriorToCurrentPoint: fmi2Boolean,
    ) -> fmi2Status;
    fn fmi2CancelStep(c: fmi2Component) -> fmi2Status;

    fn fmi2GetStatus(c: fmi2Component, s: fmi2StatusKind, value: *mut fmi2Status) -> fmi2Status;
    fn fmi2GetRealStatus(c: fmi2Component, s: fmi2StatusKind, value: *mut fmi2Real) -> fmi2Status;
    fn fmi2GetIntegerStatus(
        c: fmi2Component,
        s: fmi2StatusKind,
        value: *mut fmi2Integer,
    ) -> fmi2Status;
    fn fmi2GetBooleanStatus(
        c: fmi2Component,
        s: fmi2StatusKind,
        value: *mut fmi2Boolean,
    ) -> fmi2Status;
    fn fmi2GetStringStatus(
        c: fmi2Component,
        s: fmi2StatusKind,
        value: *mut fmi2String,
    ) -> fmi2Status;
}

impl Fmi2Binding {
    /// The module the entry points were resolved from.
    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }
}

impl std::fmt::Debug for Fmi2Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fmi2Binding")
            .field("module", &self.module.describe())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::StaticModule;

    extern "C" fn placeholder() {}

    fn complete_module() -> StaticModule {
        let mut module = StaticModule::new("placeholders");
        for name in Fmi2Binding::SYMBOLS {
            unsafe { module.insert(name, placeholder as *const c_void) };
        }
        module
    }

    #[test]
    fn test_symbol_list() {
        assert_eq!(Fmi2Binding::SYMBOLS.len(), 34);
        let unique: std::collections::HashSet<_> = Fmi2Binding::SYMBOLS.iter().collect();
        assert_eq!(unique.len(), Fmi2Binding::SYMBOLS.len());
        assert!(Fmi2Binding::SYMBOLS.contains(&"fmi2DoStep"));
        assert!(Fmi2Binding::SYMBOLS.contains(&"fmi2GetStringStatus"));
    }

    #[test_log::test]
    fn test_resolve_complete() {
        let binding = Fmi2Binding::new(Box::new(complete_module())).unwrap();
        assert_eq!(binding.module().describe(), "static module 'placeholders'");
        assert!(format!("{binding:?}").contains("placeholders"));
    }

    #[test_log::test]
    fn test_resolve_missing() {
        for missing in ["fmi2GetTypesPlatform", "fmi2DoStep", "fmi2GetStringStatus"] {
            let mut module = complete_module();
            module.remove(missing);
            let err = Fmi2Binding::new(Box::new(module)).unwrap_err();
            assert_eq!(err.name, missing);
        }
    }
}
