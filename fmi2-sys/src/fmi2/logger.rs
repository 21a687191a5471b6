use std::ffi::CStr;

use crate::fmi2 as binding;

unsafe fn str_or<'a>(s: binding::fmi2String, default: &'a str) -> std::borrow::Cow<'a, str> {
    if s.is_null() {
        default.into()
    } else {
        unsafe { CStr::from_ptr(s) }.to_string_lossy()
    }
}

/// Map an FMU log status onto a [`log::Level`].
pub fn status_level(status: binding::fmi2Status) -> log::Level {
    match status {
        binding::fmi2Status_fmi2OK => log::Level::Info,
        binding::fmi2Status_fmi2Warning => log::Level::Warn,
        binding::fmi2Status_fmi2Discard => log::Level::Trace,
        binding::fmi2Status_fmi2Error => log::Level::Error,
        binding::fmi2Status_fmi2Fatal => log::Level::Error,
        _ => log::Level::Info,
    }
}

/// This function gets called from logger.c
#[unsafe(no_mangle)]
extern "C" fn callback_log(
    _component_environment: binding::fmi2ComponentEnvironment,
    instance_name: binding::fmi2String,
    status: binding::fmi2Status,
    category: binding::fmi2String,
    message: binding::fmi2String,
) {
    let instance_name = unsafe { str_or(instance_name, "NULL") };
    let category = unsafe { str_or(category, "") };
    let message = unsafe { str_or(message, "") };

    log::logger().log(
        &log::Record::builder()
            .args(format_args!("[{category}] {message}"))
            .level(status_level(status))
            .module_path(Some("logger"))
            .target(&instance_name)
            .build(),
    );
}

#[link(name = "fmi2logger", kind = "static")]
extern "C" {
    /// This function is implemented in logger.c
    /// Note: This can be re-implemented in pure Rust once the `c_variadics` feature stabilizes.
    /// See: https://doc.rust-lang.org/beta/unstable-book/language-features/c-variadic.html
    pub fn callback_logger_handler(
        componentEnvironment: binding::fmi2ComponentEnvironment,
        instanceName: binding::fmi2String,
        status: binding::fmi2Status,
        category: binding::fmi2String,
        message: binding::fmi2String,
        ...
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_level() {
        assert_eq!(status_level(binding::fmi2Status_fmi2OK), log::Level::Info);
        assert_eq!(status_level(binding::fmi2Status_fmi2Warning), log::Level::Warn);
        assert_eq!(status_level(binding::fmi2Status_fmi2Fatal), log::Level::Error);
    }

    #[test_log::test]
    fn test_logger_handler_formats() {
        unsafe {
            callback_logger_handler(
                std::ptr::null_mut(),
                c"inst".as_ptr(),
                binding::fmi2Status_fmi2Warning,
                c"logAll".as_ptr(),
                c"value %d of %s".as_ptr(),
                42 as std::os::raw::c_int,
                c"x".as_ptr(),
            );
            callback_logger_handler(
                std::ptr::null_mut(),
                std::ptr::null(),
                binding::fmi2Status_fmi2OK,
                std::ptr::null(),
                std::ptr::null(),
            );
        }
    }
}
