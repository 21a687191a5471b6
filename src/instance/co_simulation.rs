use crate::{
    binding, import::fmi_str, Error, Fmi2Error, Fmi2Res, Fmi2Status, InvalidArgument, Status,
    StatusKind, ValueReference,
};

use super::{check_len, traits::CoSimulation, Instance, LifecycleState, Operation};

/// Relative slack allowed between the end of one step and the start of the next.
const TIME_TOLERANCE: f64 = 1e-9;

impl Instance<'_> {
    fn check_communication_point(
        &self,
        current: f64,
        step_size: f64,
    ) -> Result<(), InvalidArgument> {
        if !current.is_finite() {
            return Err(InvalidArgument::InvalidCommunicationPoint(current));
        }
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(InvalidArgument::InvalidStepSize(step_size));
        }
        if let Some(expected) = self.next_communication_point {
            if current < expected - TIME_TOLERANCE * expected.abs().max(1.0) {
                return Err(InvalidArgument::NonMonotonicTime { current, expected });
            }
        }
        Ok(())
    }

    /// Finish an asynchronous step with the result reported by `fmi2GetStatus`.
    fn complete_step(&mut self, result: Status) -> Result<Fmi2Res, Error> {
        match Fmi2Status::from(result).ok() {
            Ok(Fmi2Res::Pending) => Ok(Fmi2Res::Pending),
            Err(Fmi2Error::Discard) => {
                log::debug!("{}: asynchronous step was discarded", self.name);
                self.pending_communication_point = None;
                self.transition(LifecycleState::StepMode);
                Err(Fmi2Error::Discard.into())
            }
            _ => {
                let res = self.track(
                    Operation::DoStep,
                    result.into(),
                    Some(LifecycleState::StepMode),
                )?;
                if let Some(end) = self.pending_communication_point.take() {
                    self.next_communication_point = Some(end);
                }
                Ok(res)
            }
        }
    }
}

impl CoSimulation for Instance<'_> {
    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::DoStep)?;
        self.check_communication_point(current_communication_point, communication_step_size)?;

        let status = Fmi2Status(unsafe {
            self.binding().fmi2DoStep(
                self.component,
                current_communication_point,
                communication_step_size,
                no_set_fmu_state_prior_to_current_point as binding::fmi2Boolean,
            )
        });
        let end = current_communication_point + communication_step_size;
        match self.track(Operation::DoStep, status, None)? {
            Fmi2Res::Pending => {
                self.pending_communication_point = Some(end);
                self.transition(LifecycleState::StepInProgress);
                Ok(Fmi2Res::Pending)
            }
            res => {
                self.next_communication_point = Some(end);
                Ok(res)
            }
        }
    }

    fn cancel_step(&mut self) -> Result<Fmi2Res, Error> {
        self.guard(Operation::CancelStep)?;
        let status = Fmi2Status(unsafe { self.binding().fmi2CancelStep(self.component) });
        let res = self.track(
            Operation::CancelStep,
            status,
            Some(LifecycleState::StepCanceled),
        )?;
        self.pending_communication_point = None;
        Ok(res)
    }

    fn get_status(&mut self, kind: StatusKind) -> Result<Status, Error> {
        self.guard(Operation::GetStatus)?;
        let mut value = binding::fmi2Status_fmi2OK;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetStatus(self.component, kind.into(), &mut value)
        });
        self.track(Operation::GetStatus, status, None)?;
        Ok(Status::try_from(value)?)
    }

    fn get_real_status(&mut self, kind: StatusKind) -> Result<f64, Error> {
        self.guard(Operation::GetStatus)?;
        let mut value = 0.0;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetRealStatus(self.component, kind.into(), &mut value)
        });
        self.track(Operation::GetStatus, status, None)?;
        Ok(value)
    }

    fn get_integer_status(&mut self, kind: StatusKind) -> Result<i32, Error> {
        self.guard(Operation::GetStatus)?;
        let mut value = 0;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetIntegerStatus(self.component, kind.into(), &mut value)
        });
        self.track(Operation::GetStatus, status, None)?;
        Ok(value)
    }

    fn get_boolean_status(&mut self, kind: StatusKind) -> Result<bool, Error> {
        self.guard(Operation::GetStatus)?;
        let mut value = binding::fmi2False;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetBooleanStatus(self.component, kind.into(), &mut value)
        });
        self.track(Operation::GetStatus, status, None)?;
        Ok(value != binding::fmi2False)
    }

    fn get_string_status(&mut self, kind: StatusKind) -> Result<String, Error> {
        self.guard(Operation::GetStatus)?;
        let mut value: binding::fmi2String = std::ptr::null();
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2GetStringStatus(self.component, kind.into(), &mut value)
        });
        self.track(Operation::GetStatus, status, None)?;
        Ok(unsafe { fmi_str(value) }?.to_owned())
    }

    fn do_step_status(&mut self) -> Result<Fmi2Res, Error> {
        let result = self.get_status(StatusKind::DoStepStatus)?;
        if self.state == LifecycleState::StepInProgress {
            self.complete_step(result)
        } else {
            Ok(Fmi2Status::from(result).ok()?)
        }
    }

    fn pending_status(&mut self) -> Result<String, Error> {
        self.get_string_status(StatusKind::PendingStatus)
    }

    fn last_successful_time(&mut self) -> Result<f64, Error> {
        self.get_real_status(StatusKind::LastSuccessfulTime)
    }

    fn terminated(&mut self) -> Result<bool, Error> {
        self.get_boolean_status(StatusKind::Terminated)
    }

    fn set_real_input_derivatives(
        &mut self,
        vrs: &[ValueReference],
        orders: &[i32],
        values: &[f64],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetRealInputDerivatives)?;
        check_len(vrs.len(), orders.len())?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding().fmi2SetRealInputDerivatives(
                self.component,
                vrs.as_ptr(),
                vrs.len(),
                orders.as_ptr(),
                values.as_ptr(),
            )
        });
        self.track(Operation::SetRealInputDerivatives, status, None)
    }

    fn get_real_output_derivatives(
        &mut self,
        vrs: &[ValueReference],
        orders: &[i32],
        values: &mut [f64],
    ) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetRealOutputDerivatives)?;
        check_len(vrs.len(), orders.len())?;
        check_len(vrs.len(), values.len())?;
        let status = Fmi2Status(unsafe {
            self.binding().fmi2GetRealOutputDerivatives(
                self.component,
                vrs.as_ptr(),
                vrs.len(),
                orders.as_ptr(),
                values.as_mut_ptr(),
            )
        });
        self.track(Operation::GetRealOutputDerivatives, status, None)
    }
}

