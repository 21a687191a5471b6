//! A deterministic FMI 2.0 Co-Simulation FMU.
//!
//! Built as a `cdylib` it is a regular FMU binary exporting all co-simulation entry points;
//! linked as an `rlib` the same functions can be handed to a client through [`static_module`].
//!
//! ## Variables
//!
//! | Type    | Reference | Variable                       | Access |
//! |---------|-----------|--------------------------------|--------|
//! | Real    | 0, 1      | `a`, `b`                       | input  |
//! | Real    | 2         | `a + b`                        | output |
//! | Real    | 3         | integral of `a + b` over time  | output |
//! | Real    | 4         | time                           | output |
//! | Real    | 5         | `max_step`, 0 for unlimited    | input  |
//! | Integer | 3, 4      | inputs                         | input  |
//! | Integer | 5         | sum of 3 and 4                 | output |
//! | Integer | 6         | `pending_polls`                | input  |
//! | Integer | 7         | number of completed steps      | output |
//! | Boolean | 6, 7      | inputs                         | input  |
//! | Boolean | 8         | 6 or 7                         | output |
//! | Boolean | 9         | `fail_next_step`               | input  |
//! | Boolean | 10        | `warn`                         | input  |
//! | String  | 9, 10     | inputs                         | input  |
//! | String  | 11        | concatenation of 9 and 10      | output |
//!
//! `fmi2DoStep` returns `Fatal` if `fail_next_step` is set, and `Discard` if the step is longer
//! than `max_step` or passes the stop time (the model then reports itself terminated). With
//! `pending_polls > 0` the step is computed asynchronously: it completes after that many
//! `fmi2GetStatus(fmi2DoStepStatus)` polls, unless cancelled with `fmi2CancelStep`.
//!
//! While `warn` is set, `fmi2ExitInitializationMode`, a synchronous `fmi2DoStep` and
//! `fmi2Terminate` do their work and return `Warning`.
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::{
    ffi::{c_void, CStr, CString},
    fmt,
};

use fmi2_sys::{fmi2::*, StaticModule};

mod model;

pub use model::{ModelError, Values};
use model::StepCheck;

/// GUID expected by `fmi2Instantiate`.
pub const GUID: &str = "{3c7a1d5e-8f2b-4e69-b0d4-5a91c2e7f36b}";

/// Value references of the stub variables.
pub mod vr {
    use fmi2_sys::fmi2::fmi2ValueReference;

    pub const REAL_A: fmi2ValueReference = 0;
    pub const REAL_B: fmi2ValueReference = 1;
    pub const REAL_SUM: fmi2ValueReference = 2;
    pub const REAL_INTEGRAL: fmi2ValueReference = 3;
    pub const REAL_TIME: fmi2ValueReference = 4;
    pub const REAL_MAX_STEP: fmi2ValueReference = 5;
    pub const INTEGER_A: fmi2ValueReference = 3;
    pub const INTEGER_B: fmi2ValueReference = 4;
    pub const INTEGER_SUM: fmi2ValueReference = 5;
    pub const INTEGER_PENDING_POLLS: fmi2ValueReference = 6;
    pub const INTEGER_STEPS: fmi2ValueReference = 7;
    pub const BOOLEAN_A: fmi2ValueReference = 6;
    pub const BOOLEAN_B: fmi2ValueReference = 7;
    pub const BOOLEAN_OR: fmi2ValueReference = 8;
    pub const BOOLEAN_FAIL_NEXT_STEP: fmi2ValueReference = 9;
    pub const BOOLEAN_WARN: fmi2ValueReference = 10;
    pub const STRING_A: fmi2ValueReference = 9;
    pub const STRING_B: fmi2ValueReference = 10;
    pub const STRING_CONCAT: fmi2ValueReference = 11;
}

struct PendingStep {
    remaining_polls: i32,
    t: f64,
    h: f64,
}

struct StubInstance {
    name: CString,
    logger: fmi2CallbackLogger,
    environment: fmi2ComponentEnvironment,
    logging_on: bool,
    values: Values,
    stop_time: Option<f64>,
    pending: Option<PendingStep>,
    last_step_status: fmi2Status,
    input_derivatives: [f64; 2],
    /// Returned by `fmi2GetString`, valid until the next call
    string_buffers: Vec<CString>,
    /// Returned by `fmi2GetStringStatus`
    status_buffer: CString,
}

impl StubInstance {
    fn log(&self, status: fmi2Status, category: &CStr, message: fmt::Arguments<'_>) {
        let Some(logger) = self.logger else {
            return;
        };
        let message = CString::new(message.to_string().replace('\0', "")).unwrap_or_default();
        unsafe {
            logger(
                self.environment,
                self.name.as_ptr(),
                status,
                category.as_ptr(),
                c"%s".as_ptr(),
                message.as_ptr(),
            )
        };
    }

    fn trace(&self, message: fmt::Arguments<'_>) {
        if self.logging_on {
            self.log(fmi2Status_fmi2OK, c"logAll", message);
        }
    }

    fn error(&self, error: impl fmt::Display) -> fmi2Status {
        self.log(
            fmi2Status_fmi2Error,
            c"logStatusError",
            format_args!("{error}"),
        );
        fmi2Status_fmi2Error
    }

    /// `Warning` if the `warn` input is set, `OK` otherwise.
    fn warn_if_set(&self, function: &str) -> fmi2Status {
        if !self.values.warn {
            return fmi2Status_fmi2OK;
        }
        self.log(
            fmi2Status_fmi2Warning,
            c"logStatusWarning",
            format_args!("{function}: warn is set"),
        );
        fmi2Status_fmi2Warning
    }

    fn discard(&mut self, message: fmt::Arguments<'_>) -> fmi2Status {
        self.log(fmi2Status_fmi2Discard, c"logStatusDiscard", message);
        self.last_step_status = fmi2Status_fmi2Discard;
        fmi2Status_fmi2Discard
    }

    fn reset(&mut self) {
        self.values = Values::default();
        self.stop_time = None;
        self.pending = None;
        self.last_step_status = fmi2Status_fmi2OK;
        self.input_derivatives = [0.0; 2];
    }

    fn complete_step(&mut self, t: f64, h: f64) {
        self.values.advance(t, h);
        self.last_step_status = fmi2Status_fmi2OK;
        self.trace(format_args!(
            "completed step to {}, integral = {}",
            self.values.time, self.values.integral
        ));
    }
}

macro_rules! checked_deref {
    ($ptr:expr) => {{
        if ($ptr as *mut c_void).is_null() {
            log::error!("Invalid FMU instance");
            return fmi2Status_fmi2Error;
        }
        unsafe { &mut *($ptr as *mut StubInstance) }
    }};
}

unsafe fn slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }
}

unsafe fn slice_mut<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] {
    if len == 0 || ptr.is_null() {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}

/// Store `values` into the FMU state at `state`, allocating one if it is null.
unsafe fn store_state(state: *mut fmi2FMUstate, values: Values) {
    let current = unsafe { *state };
    if current.is_null() {
        unsafe { *state = Box::into_raw(Box::new(values)) as fmi2FMUstate };
    } else {
        unsafe { *(current as *mut Values) = values };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetTypesPlatform() -> *const fmi2Char {
    c"default".as_ptr()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetVersion() -> *const fmi2Char {
    c"2.0".as_ptr()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetDebugLogging(
    c: fmi2Component,
    loggingOn: fmi2Boolean,
    _nCategories: usize,
    _categories: *const fmi2String,
) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.logging_on = loggingOn != fmi2False;
    instance.trace(format_args!("fmi2SetDebugLogging({})", instance.logging_on));
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Instantiate(
    instanceName: fmi2String,
    fmuType: fmi2Type,
    fmuGUID: fmi2String,
    _fmuResourceLocation: fmi2String,
    functions: *const fmi2CallbackFunctions,
    _visible: fmi2Boolean,
    loggingOn: fmi2Boolean,
) -> fmi2Component {
    if functions.is_null() || instanceName.is_null() {
        log::error!("fmi2Instantiate: missing instance name or callback functions");
        return std::ptr::null_mut();
    }
    let functions = unsafe { &*functions };
    let mut instance = Box::new(StubInstance {
        name: unsafe { CStr::from_ptr(instanceName) }.to_owned(),
        logger: functions.logger,
        environment: functions.componentEnvironment,
        logging_on: loggingOn != fmi2False,
        values: Values::default(),
        stop_time: None,
        pending: None,
        last_step_status: fmi2Status_fmi2OK,
        input_derivatives: [0.0; 2],
        string_buffers: Vec::new(),
        status_buffer: CString::default(),
    });
    instance.reset();

    if fmuType != fmi2Type_fmi2CoSimulation {
        instance.error("Only Co-Simulation is supported");
        return std::ptr::null_mut();
    }
    let guid = if fmuGUID.is_null() {
        ""
    } else {
        unsafe { CStr::from_ptr(fmuGUID) }.to_str().unwrap_or("")
    };
    if guid != GUID {
        instance.error(format_args!("Wrong GUID {guid}, expected {GUID}"));
        return std::ptr::null_mut();
    }

    instance.trace(format_args!("fmi2Instantiate"));
    Box::into_raw(instance) as fmi2Component
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeInstance(c: fmi2Component) {
    if c.is_null() {
        return;
    }
    let instance = unsafe { Box::from_raw(c as *mut StubInstance) };
    instance.trace(format_args!("fmi2FreeInstance"));
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetupExperiment(
    c: fmi2Component,
    _toleranceDefined: fmi2Boolean,
    _tolerance: fmi2Real,
    startTime: fmi2Real,
    stopTimeDefined: fmi2Boolean,
    stopTime: fmi2Real,
) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.stop_time = (stopTimeDefined != fmi2False).then_some(stopTime);
    instance.values.time = startTime;
    instance.values.last_successful_time = startTime;
    instance.trace(format_args!(
        "fmi2SetupExperiment(start = {startTime}, stop = {:?})",
        instance.stop_time
    ));
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2EnterInitializationMode(c: fmi2Component) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.trace(format_args!("fmi2EnterInitializationMode"));
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2ExitInitializationMode(c: fmi2Component) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.trace(format_args!("fmi2ExitInitializationMode"));
    instance.warn_if_set("fmi2ExitInitializationMode")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Terminate(c: fmi2Component) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.pending = None;
    instance.trace(format_args!("fmi2Terminate"));
    instance.warn_if_set("fmi2Terminate")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Reset(c: fmi2Component) -> fmi2Status {
    let instance = checked_deref!(c);
    instance.reset();
    instance.trace(format_args!("fmi2Reset"));
    fmi2Status_fmi2OK
}

macro_rules! get_values {
    ($name:ident, $ty:ty, $getter:ident, $convert:expr) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(
            c: fmi2Component,
            vr: *const fmi2ValueReference,
            nvr: usize,
            value: *mut $ty,
        ) -> fmi2Status {
            let instance = checked_deref!(c);
            let vrs = unsafe { slice(vr, nvr) };
            let values = unsafe { slice_mut(value, nvr) };
            for (vr, value) in vrs.iter().zip(values) {
                match instance.values.$getter(*vr) {
                    Ok(v) => *value = $convert(v),
                    Err(e) => return instance.error(e),
                }
            }
            fmi2Status_fmi2OK
        }
    };
}

macro_rules! set_values {
    ($name:ident, $ty:ty, $setter:ident, $convert:expr) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(
            c: fmi2Component,
            vr: *const fmi2ValueReference,
            nvr: usize,
            value: *const $ty,
        ) -> fmi2Status {
            let instance = checked_deref!(c);
            let vrs = unsafe { slice(vr, nvr) };
            let values = unsafe { slice(value, nvr) };
            for (vr, value) in vrs.iter().zip(values) {
                if let Err(e) = instance.values.$setter(*vr, $convert(*value)) {
                    return instance.error(e);
                }
            }
            fmi2Status_fmi2OK
        }
    };
}

get_values!(fmi2GetReal, fmi2Real, get_real, |v| v);
get_values!(fmi2GetInteger, fmi2Integer, get_integer, |v| v);
get_values!(fmi2GetBoolean, fmi2Boolean, get_boolean, |v: bool| {
    v as fmi2Boolean
});
set_values!(fmi2SetReal, fmi2Real, set_real, |v| v);
set_values!(fmi2SetInteger, fmi2Integer, set_integer, |v| v);
set_values!(fmi2SetBoolean, fmi2Boolean, set_boolean, |v: fmi2Boolean| {
    v != fmi2False
});

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetString(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2String,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let vrs = unsafe { slice(vr, nvr) };
    let mut buffers = Vec::with_capacity(vrs.len());
    for vr in vrs {
        match instance.values.get_string(*vr) {
            Ok(s) => buffers.push(CString::new(s).unwrap_or_default()),
            Err(e) => return instance.error(e),
        }
    }
    instance.string_buffers = buffers;
    let values = unsafe { slice_mut(value, nvr) };
    for (value, buffer) in values.iter_mut().zip(&instance.string_buffers) {
        *value = buffer.as_ptr();
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetString(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2String,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let vrs = unsafe { slice(vr, nvr) };
    let values = unsafe { slice(value, nvr) };
    for (vr, value) in vrs.iter().zip(values) {
        if value.is_null() {
            return instance.error(format_args!("Null string for value reference {vr}"));
        }
        let Ok(value) = unsafe { CStr::from_ptr(*value) }.to_str() else {
            return instance.error(format_args!("Invalid UTF-8 for value reference {vr}"));
        };
        if let Err(e) = instance.values.set_string(*vr, value) {
            return instance.error(e);
        }
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetFMUstate(
    c: fmi2Component,
    FMUstate: *mut fmi2FMUstate,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if FMUstate.is_null() {
        return instance.error("fmi2GetFMUstate: null state pointer");
    }
    unsafe { store_state(FMUstate, instance.values.clone()) };
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetFMUstate(c: fmi2Component, FMUstate: fmi2FMUstate) -> fmi2Status {
    let instance = checked_deref!(c);
    if FMUstate.is_null() {
        return instance.error("fmi2SetFMUstate: null state");
    }
    instance.values = unsafe { &*(FMUstate as *const Values) }.clone();
    instance.pending = None;
    instance.last_step_status = fmi2Status_fmi2OK;
    instance.trace(format_args!(
        "fmi2SetFMUstate: restored time {}",
        instance.values.time
    ));
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeFMUstate(
    c: fmi2Component,
    FMUstate: *mut fmi2FMUstate,
) -> fmi2Status {
    let _instance = checked_deref!(c);
    if !FMUstate.is_null() && !unsafe { *FMUstate }.is_null() {
        drop(unsafe { Box::from_raw(*FMUstate as *mut Values) });
        unsafe { *FMUstate = std::ptr::null_mut() };
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SerializedFMUstateSize(
    c: fmi2Component,
    FMUstate: fmi2FMUstate,
    size: *mut usize,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if FMUstate.is_null() || size.is_null() {
        return instance.error("fmi2SerializedFMUstateSize: null argument");
    }
    unsafe { *size = (*(FMUstate as *const Values)).serialized_size() };
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SerializeFMUstate(
    c: fmi2Component,
    FMUstate: fmi2FMUstate,
    serializedState: *mut fmi2Byte,
    size: usize,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if FMUstate.is_null() {
        return instance.error("fmi2SerializeFMUstate: null state");
    }
    let bytes = unsafe { &*(FMUstate as *const Values) }.serialize();
    if size < bytes.len() {
        return instance.error(format_args!(
            "fmi2SerializeFMUstate: buffer of {size} bytes, {} needed",
            bytes.len()
        ));
    }
    let buffer = unsafe { slice_mut(serializedState as *mut u8, bytes.len()) };
    buffer.copy_from_slice(&bytes);
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2DeSerializeFMUstate(
    c: fmi2Component,
    serializedState: *const fmi2Byte,
    size: usize,
    FMUstate: *mut fmi2FMUstate,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if FMUstate.is_null() {
        return instance.error("fmi2DeSerializeFMUstate: null state pointer");
    }
    let bytes = unsafe { slice(serializedState as *const u8, size) };
    match Values::deserialize(bytes) {
        Ok(values) => {
            unsafe { store_state(FMUstate, values) };
            fmi2Status_fmi2OK
        }
        Err(e) => instance.error(e),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetDirectionalDerivative(
    c: fmi2Component,
    vUnknown_ref: *const fmi2ValueReference,
    nUnknown: usize,
    vKnown_ref: *const fmi2ValueReference,
    nKnown: usize,
    dvKnown: *const fmi2Real,
    dvUnknown: *mut fmi2Real,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let unknowns = unsafe { slice(vUnknown_ref, nUnknown) };
    let knowns = unsafe { slice(vKnown_ref, nKnown) };
    let dv_known = unsafe { slice(dvKnown, nKnown) };
    let dv_unknown = unsafe { slice_mut(dvUnknown, nUnknown) };
    for (unknown, dv) in unknowns.iter().zip(dv_unknown) {
        let mut sum = 0.0;
        for (known, seed) in knowns.iter().zip(dv_known) {
            match instance.values.partial_derivative(*unknown, *known) {
                Ok(partial) => sum += partial * seed,
                Err(e) => return instance.error(e),
            }
        }
        *dv = sum;
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetRealInputDerivatives(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    order: *const fmi2Integer,
    value: *const fmi2Real,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let vrs = unsafe { slice(vr, nvr) };
    let orders = unsafe { slice(order, nvr) };
    let values = unsafe { slice(value, nvr) };
    for ((vr, order), value) in vrs.iter().zip(orders).zip(values) {
        if *order != 1 {
            return instance.error(ModelError::DerivativeOrder(*order));
        }
        match *vr {
            0 | 1 => instance.input_derivatives[*vr as usize] = *value,
            vr => {
                return instance.error(ModelError::UnknownReference { kind: "input", vr });
            }
        }
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetRealOutputDerivatives(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    order: *const fmi2Integer,
    value: *mut fmi2Real,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let vrs = unsafe { slice(vr, nvr) };
    let orders = unsafe { slice(order, nvr) };
    let values = unsafe { slice_mut(value, nvr) };
    for ((vr, order), value) in vrs.iter().zip(orders).zip(values) {
        if *order != 1 {
            return instance.error(ModelError::DerivativeOrder(*order));
        }
        if *vr != crate::vr::REAL_SUM {
            return instance.error(ModelError::UnknownReference {
                kind: "output",
                vr: *vr,
            });
        }
        *value = instance.input_derivatives.iter().sum();
    }
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2DoStep(
    c: fmi2Component,
    currentCommunicationPoint: fmi2Real,
    communicationStepSize: fmi2Real,
    _noSetFMUStatePriorToCurrentPoint: fmi2Boolean,
) -> fmi2Status {
    let instance = checked_deref!(c);
    let (t, h) = (currentCommunicationPoint, communicationStepSize);
    if instance.pending.is_some() {
        return instance.error("fmi2DoStep: an asynchronous step is still running");
    }
    let (stop_time, max_step) = (instance.stop_time, instance.values.max_step);
    match instance.values.check_step(t, h, stop_time) {
        StepCheck::Fatal => {
            instance.log(
                fmi2Status_fmi2Fatal,
                c"logStatusFatal",
                format_args!("fmi2DoStep: fail_next_step is set"),
            );
            instance.last_step_status = fmi2Status_fmi2Fatal;
            fmi2Status_fmi2Fatal
        }
        StepCheck::TooLarge => instance.discard(format_args!(
            "fmi2DoStep: step size {h} exceeds max_step {max_step}"
        )),
        StepCheck::StopTimeReached => instance.discard(format_args!(
            "fmi2DoStep: step to {} passes the stop time {stop_time:?}",
            t + h
        )),
        StepCheck::Proceed if instance.values.pending_polls > 0 => {
            instance.pending = Some(PendingStep {
                remaining_polls: instance.values.pending_polls,
                t,
                h,
            });
            instance.last_step_status = fmi2Status_fmi2Pending;
            fmi2Status_fmi2Pending
        }
        StepCheck::Proceed => {
            instance.complete_step(t, h);
            instance.warn_if_set("fmi2DoStep")
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2CancelStep(c: fmi2Component) -> fmi2Status {
    let instance = checked_deref!(c);
    if instance.pending.take().is_none() {
        return instance.error("fmi2CancelStep: no asynchronous step is running");
    }
    instance.last_step_status = fmi2Status_fmi2Discard;
    instance.trace(format_args!("fmi2CancelStep"));
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetStatus(
    c: fmi2Component,
    s: fmi2StatusKind,
    value: *mut fmi2Status,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if s != fmi2StatusKind_fmi2DoStepStatus || value.is_null() {
        return fmi2Status_fmi2Discard;
    }
    if let Some(pending) = instance.pending.as_mut() {
        pending.remaining_polls -= 1;
        if pending.remaining_polls <= 0 {
            let (t, h) = (pending.t, pending.h);
            instance.pending = None;
            instance.complete_step(t, h);
        }
    }
    unsafe { *value = instance.last_step_status };
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetRealStatus(
    c: fmi2Component,
    s: fmi2StatusKind,
    value: *mut fmi2Real,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if s != fmi2StatusKind_fmi2LastSuccessfulTime || value.is_null() {
        return fmi2Status_fmi2Discard;
    }
    unsafe { *value = instance.values.last_successful_time };
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetIntegerStatus(
    c: fmi2Component,
    _s: fmi2StatusKind,
    _value: *mut fmi2Integer,
) -> fmi2Status {
    let _instance = checked_deref!(c);
    fmi2Status_fmi2Discard
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetBooleanStatus(
    c: fmi2Component,
    s: fmi2StatusKind,
    value: *mut fmi2Boolean,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if s != fmi2StatusKind_fmi2Terminated || value.is_null() {
        return fmi2Status_fmi2Discard;
    }
    unsafe { *value = instance.values.terminated as fmi2Boolean };
    fmi2Status_fmi2OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetStringStatus(
    c: fmi2Component,
    s: fmi2StatusKind,
    value: *mut fmi2String,
) -> fmi2Status {
    let instance = checked_deref!(c);
    if s != fmi2StatusKind_fmi2PendingStatus || value.is_null() {
        return fmi2Status_fmi2Discard;
    }
    let message = match &instance.pending {
        Some(pending) => format!(
            "step to {} waiting for {} more polls",
            pending.t + pending.h,
            pending.remaining_polls
        ),
        None => "no step in progress".to_owned(),
    };
    instance.status_buffer = CString::new(message).unwrap_or_default();
    unsafe { *value = instance.status_buffer.as_ptr() };
    fmi2Status_fmi2OK
}

/// All exported entry points, registered in a [`StaticModule`] named `fmi2-stub`.
pub fn static_module() -> StaticModule {
    let mut module = StaticModule::new("fmi2-stub");
    macro_rules! register {
        ($($name:ident),* $(,)?) => {
            // Each function is exported with the signature of its FMI 2.0 name.
            $(unsafe { module.insert(stringify!($name), $name as *const c_void) };)*
        };
    }
    register!(
        fmi2GetTypesPlatform,
        fmi2GetVersion,
        fmi2SetDebugLogging,
        fmi2Instantiate,
        fmi2FreeInstance,
        fmi2SetupExperiment,
        fmi2EnterInitializationMode,
        fmi2ExitInitializationMode,
        fmi2Terminate,
        fmi2Reset,
        fmi2GetReal,
        fmi2GetInteger,
        fmi2GetBoolean,
        fmi2GetString,
        fmi2SetReal,
        fmi2SetInteger,
        fmi2SetBoolean,
        fmi2SetString,
        fmi2GetFMUstate,
        fmi2SetFMUstate,
        fmi2FreeFMUstate,
        fmi2SerializedFMUstateSize,
        fmi2SerializeFMUstate,
        fmi2DeSerializeFMUstate,
        fmi2GetDirectionalDerivative,
        fmi2SetRealInputDerivatives,
        fmi2GetRealOutputDerivatives,
        fmi2DoStep,
        fmi2CancelStep,
        fmi2GetStatus,
        fmi2GetRealStatus,
        fmi2GetIntegerStatus,
        fmi2GetBooleanStatus,
        fmi2GetStringStatus,
    );
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmi2_sys::{fmi2::Fmi2Binding, Module as _};

    #[test]
    fn test_static_module_is_complete() {
        let module = static_module();
        assert_eq!(module.len(), Fmi2Binding::SYMBOLS.len());
        for name in Fmi2Binding::SYMBOLS {
            assert!(module.lookup(name).is_ok(), "{name} not registered");
        }
    }

    #[test_log::test]
    fn test_null_component() {
        let mut value = 0.0;
        let status = unsafe { fmi2GetReal(std::ptr::null_mut(), &0, 1, &mut value) };
        assert_eq!(status, fmi2Status_fmi2Error);
    }
}
