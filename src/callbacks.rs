use crate::binding;

/// Callback functions handed to the FMU at instantiation.
///
/// Layout-compatible with `fmi2CallbackFunctions`. The struct is boxed by the [`crate::Instance`]
/// and stays at a fixed address until the instance has been freed.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct CallbackFunctions {
    pub logger: binding::fmi2CallbackLogger,
    pub allocate_memory: binding::fmi2CallbackAllocateMemory,
    pub free_memory: binding::fmi2CallbackFreeMemory,
    pub step_finished: binding::fmi2StepFinished,
    pub component_environment: binding::fmi2ComponentEnvironment,
}

impl Default for CallbackFunctions {
    /// FMU log messages go to the `log` crate, with the instance name as target.
    fn default() -> Self {
        CallbackFunctions {
            logger: Some(binding::logger::callback_logger_handler as _),
            allocate_memory: Some(libc::calloc),
            free_memory: Some(libc::free),
            step_finished: None,
            component_environment: std::ptr::null_mut::<std::os::raw::c_void>(),
        }
    }
}
