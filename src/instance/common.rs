use std::{ffi::CString, sync::atomic::Ordering};

use crate::{
    binding, import::copy_fmi_strs, CallbackFunctions, Error, Fmi2Res, Fmi2Status, Fmu,
    InstantiateOptions, InvalidArgument, ValueReference,
};

use super::{check_len, traits, Instance, LifecycleState, Operation, NEXT_INSTANCE_ID};

impl<'a> Instance<'a> {
    /// Initialize a new Co-Simulation instance of `fmu`.
    pub(crate) fn new(
        fmu: &'a Fmu,
        instance_name: &str,
        options: &InstantiateOptions,
        callbacks: CallbackFunctions,
    ) -> Result<Self, Error> {
        if instance_name.is_empty() {
            return Err(InvalidArgument::EmptyInstanceName.into());
        }

        let binding = fmu.binding();
        let callbacks = Box::new(callbacks);

        let name = CString::new(instance_name)?;
        let guid = CString::new(options.guid.as_str())?;
        let resource_uri = CString::new(options.resource_uri.as_str())?;

        let component = unsafe {
            let callback_functions = &*callbacks as *const CallbackFunctions;
            binding.fmi2Instantiate(
                name.as_ptr(),
                binding::fmi2Type_fmi2CoSimulation,
                guid.as_ptr(),
                resource_uri.as_ptr(),
                callback_functions as _,
                options.visible as binding::fmi2Boolean,
                options.logging_on as binding::fmi2Boolean,
            )
        };
        if component.is_null() {
            log::error!("fmi2Instantiate returned null for '{instance_name}'");
            return Err(Error::Instantiation {
                name: instance_name.to_owned(),
            });
        }
        log::trace!("Created CS component {component:?}");

        fmu.live_instances.fetch_add(1, Ordering::AcqRel);

        Ok(Self {
            name: instance_name.to_owned(),
            fmu,
            component,
            state: LifecycleState::Instantiated,
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            callbacks,
            saved_states: Vec::new(),
            next_communication_point: None,
            pending_communication_point: None,
        })
    }
}

impl traits::Common for Instance<'_> {
    fn get_version(&self) -> Result<&str, Error> {
        self.fmu.get_version()
    }

    fn get_types_platform(&self) -> Result<&str, Error> {
        self.fmu.get_types_platform()
    }

    fn set_debug_logging(
        &mut self,
        logging_on: bool,
        categories: &[&str],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetDebugLogging)?;
        let category_cstr = categories
            .iter()
            .map(|c| CString::new(*c))
            .collect::<Result<Vec<_>, _>>()?;
        let category_ptrs: Vec<_> = category_cstr.iter().map(|c| c.as_ptr()).collect();

        let status = Fmi2Status(unsafe {
            self.binding().fmi2SetDebugLogging(
                self.component,
                logging_on as binding::fmi2Boolean,
                category_ptrs.len(),
                category_ptrs.as_ptr(),
            )
        });
        self.track(Operation::SetDebugLogging, status, None)
    }

    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetupExperiment)?;
        let status = Fmi2Status(unsafe {
            self.binding().fmi2SetupExperiment(
                self.component,
                tolerance.is_some() as binding::fmi2Boolean,
                tolerance.unwrap_or(0.0),
                start_time,
                stop_time.is_some() as binding::fmi2Boolean,
                stop_time.unwrap_or(0.0),
            )
        });
        self.track(Operation::SetupExperiment, status, None)
    }

    fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Error> {
        self.guard(Operation::EnterInitializationMode)?;
        let status =
            Fmi2Status(unsafe { self.binding().fmi2EnterInitializationMode(self.component) });
        self.track(
            Operation::EnterInitializationMode,
            status,
            Some(LifecycleState::InitializationMode),
        )
    }

    fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Error> {
        self.guard(Operation::ExitInitializationMode)?;
        let status =
            Fmi2Status(unsafe { self.binding().fmi2ExitInitializationMode(self.component) });
        self.track(
            Operation::ExitInitializationMode,
            status,
            Some(LifecycleState::StepMode),
        )
    }

    fn terminate(&mut self) -> Result<Fmi2Res, Error> {
        self.guard(Operation::Terminate)?;
        let status = Fmi2Status(unsafe { self.binding().fmi2Terminate(self.component) });
        self.track(
            Operation::Terminate,
            status,
            Some(LifecycleState::Terminated),
        )
    }

    fn reset(&mut self) -> Result<Fmi2Res, Error> {
        self.guard(Operation::Reset)?;
        let status = Fmi2Status(unsafe { self.binding().fmi2Reset(self.component) });
        let res = self.track(
            Operation::Reset,
            status,
            Some(LifecycleState::Instantiated),
        )?;
        self.next_communication_point = None;
        self.pending_communication_point = None;
        Ok(res)
    }

    fn get_real(&mut self, vrs: &[ValueReference], values: &mut [f64]) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetReal)?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetReal(self.component, vrs.as_ptr(), vrs.len(), values.as_mut_ptr())
        });
        self.track(Operation::GetReal, status, None)
    }

    fn get_integer(
        &mut self,
        vrs: &[ValueReference],
        values: &mut [i32],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetInteger)?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding().fmi2GetInteger(
                self.component,
                vrs.as_ptr(),
                vrs.len(),
                values.as_mut_ptr(),
            )
        });
        self.track(Operation::GetInteger, status, None)
    }

    fn get_boolean(
        &mut self,
        vrs: &[ValueReference],
        values: &mut [bool],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetBoolean)?;
        check_len(vrs.len(), values.len())?;
        let mut raw = vec![binding::fmi2False; vrs.len()];
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetBoolean(self.component, vrs.as_ptr(), vrs.len(), raw.as_mut_ptr())
        });
        let res = self.track(Operation::GetBoolean, status, None)?;
        for (value, raw) in values.iter_mut().zip(raw) {
            *value = raw != binding::fmi2False;
        }
        Ok(res)
    }

    fn get_string(
        &mut self,
        vrs: &[ValueReference],
        values: &mut [String],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetString)?;
        check_len(vrs.len(), values.len())?;
        let mut raw: Vec<binding::fmi2String> = vec![std::ptr::null(); vrs.len()];
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetString(self.component, vrs.as_ptr(), vrs.len(), raw.as_mut_ptr())
        });
        let res = self.track(Operation::GetString, status, None)?;
        // The buffers belong to the FMU and are only valid until its next call.
        unsafe { copy_fmi_strs(&raw, values) }?;
        Ok(res)
    }

    fn set_real(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetReal)?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2SetReal(self.component, vrs.as_ptr(), vrs.len(), values.as_ptr())
        });
        self.track(Operation::SetReal, status, None)
    }

    fn set_integer(&mut self, vrs: &[ValueReference], values: &[i32]) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetInteger)?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2SetInteger(self.component, vrs.as_ptr(), vrs.len(), values.as_ptr())
        });
        self.track(Operation::SetInteger, status, None)
    }

    fn set_boolean(&mut self, vrs: &[ValueReference], values: &[bool]) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetBoolean)?;
        check_len(vrs.len(), values.len())?;
        let raw: Vec<binding::fmi2Boolean> = values
            .iter()
            .map(|&v| v as binding::fmi2Boolean)
            .collect();
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2SetBoolean(self.component, vrs.as_ptr(), vrs.len(), raw.as_ptr())
        });
        self.track(Operation::SetBoolean, status, None)
    }

    fn set_string(&mut self, vrs: &[ValueReference], values: &[&str]) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetString)?;
        check_len(vrs.len(), values.len())?;
        let values_cstr = values
            .iter()
            .map(|v| CString::new(*v))
            .collect::<Result<Vec<_>, _>>()?;
        let value_ptrs: Vec<_> = values_cstr.iter().map(|c| c.as_ptr()).collect();
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2SetString(self.component, vrs.as_ptr(), vrs.len(), value_ptrs.as_ptr())
        });
        self.track(Operation::SetString, status, None)
    }

    fn get_directional_derivative(
        &mut self,
        unknown_vrs: &[ValueReference],
        known_vrs: &[ValueReference],
        dv_known_values: &[f64],
        dv_unknown_values: &mut [f64],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetDirectionalDerivative)?;
        check_len(known_vrs.len(), dv_known_values.len())?;
        check_len(unknown_vrs.len(), dv_unknown_values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding().fmi2GetDirectionalDerivative(
                self.component,
                unknown_vrs.as_ptr(),
                unknown_vrs.len(),
                known_vrs.as_ptr(),
                known_vrs.len(),
                dv_known_values.as_ptr(),
                dv_unknown_values.as_mut_ptr(),
            )
        });
        self.track(Operation::GetDirectionalDerivative, status, None)
    }
}
