use crate::binding;

/// Outcome of an FMI 2.0 call, with the standard's wire values.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    OK = binding::fmi2Status_fmi2OK,
    Warning = binding::fmi2Status_fmi2Warning,
    Discard = binding::fmi2Status_fmi2Discard,
    Error = binding::fmi2Status_fmi2Error,
    Fatal = binding::fmi2Status_fmi2Fatal,
    Pending = binding::fmi2Status_fmi2Pending,
}

impl TryFrom<binding::fmi2Status> for Status {
    type Error = Fmi2Error;

    fn try_from(status: binding::fmi2Status) -> Result<Self, Fmi2Error> {
        match status {
            binding::fmi2Status_fmi2OK => Ok(Status::OK),
            binding::fmi2Status_fmi2Warning => Ok(Status::Warning),
            binding::fmi2Status_fmi2Discard => Ok(Status::Discard),
            binding::fmi2Status_fmi2Error => Ok(Status::Error),
            binding::fmi2Status_fmi2Fatal => Ok(Status::Fatal),
            binding::fmi2Status_fmi2Pending => Ok(Status::Pending),
            _ => Err(Fmi2Error::InvalidStatus(status)),
        }
    }
}

impl From<Status> for binding::fmi2Status {
    fn from(status: Status) -> Self {
        status as binding::fmi2Status
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Can be called when the fmi2DoStep function returned fmi2Pending. The function delivers
    /// fmi2Pending if the computation is not finished. Otherwise the function returns the result
    /// of the asynchronously executed fmi2DoStep call
    DoStepStatus = binding::fmi2StatusKind_fmi2DoStepStatus,
    /// Can be called when the fmi2DoStep function returned fmi2Pending. The function delivers a
    /// string which informs about the status of the currently running asynchronous fmi2DoStep
    /// computation.
    PendingStatus = binding::fmi2StatusKind_fmi2PendingStatus,
    /// Returns the end time of the last successfully completed communication step. Can be called
    /// after fmi2DoStep(...) returned fmi2Discard.
    LastSuccessfulTime = binding::fmi2StatusKind_fmi2LastSuccessfulTime,
    /// Returns true, if the slave wants to terminate the simulation. Can be called after
    /// fmi2DoStep(...) returned fmi2Discard. Use fmi2LastSuccessfulTime to determine the time
    /// instant at which the slave terminated
    Terminated = binding::fmi2StatusKind_fmi2Terminated,
}

impl From<StatusKind> for binding::fmi2StatusKind {
    fn from(kind: StatusKind) -> Self {
        kind as binding::fmi2StatusKind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2Res {
    /// All well
    OK,
    /// Things are not quite right, but the computation can continue. Function “logger” was called
    /// in the model (see below), and it is expected that this function has shown the prepared
    /// information message to the user.
    Warning,
    /// This status is returned only from the co-simulation interface, if the slave executes the
    /// function in an asynchronous way. That means the slave starts to compute but returns
    /// immediately.
    ///
    /// The master has to call [`crate::CoSimulation::do_step_status`] to determine if the slave
    /// has finished the computation. Can be returned only by [`crate::CoSimulation::do_step`]
    /// and by the status queries.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fmi2Error {
    /// For “co-simulation”: the step failed, or the slave is not able to return the required
    /// status information. The master has to decide if the simulation run can be continued, for
    /// example by restoring a formerly stored FMU state and repeating the step with a smaller
    /// step size.
    #[error("Discard")]
    Discard,
    /// The FMU encountered an error. The simulation cannot be continued with this FMU instance. If
    /// one of the functions returns [`Fmi2Error::Error`], it can be tried to restart the
    /// simulation from a formerly stored FMU state by calling
    /// [`crate::Instance::set_fmu_state`]. If not, [`crate::Common::reset`] or
    /// [`crate::Common::terminate`] must be called afterwards.
    #[error("Error")]
    Error,
    /// The model computations are irreparably corrupted for all FMU instances.
    #[error("Fatal")]
    Fatal,
    /// The FMU returned a value outside of the `fmi2Status` enumeration.
    #[error("Invalid fmi2Status {0}")]
    InvalidStatus(binding::fmi2Status),
}

/// Raw status as returned from an FMU entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fmi2Status(pub(crate) binding::fmi2Status);

impl Fmi2Status {
    /// Convert to [`Result<Fmi2Res, Fmi2Error>`]
    #[inline]
    pub fn ok(self) -> Result<Fmi2Res, Fmi2Error> {
        self.into()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 == binding::fmi2Status_fmi2Error || self.0 == binding::fmi2Status_fmi2Fatal
    }

    #[inline]
    pub fn raw(&self) -> binding::fmi2Status {
        self.0
    }
}

impl From<binding::fmi2Status> for Fmi2Status {
    fn from(status: binding::fmi2Status) -> Self {
        Self(status)
    }
}

impl From<Status> for Fmi2Status {
    fn from(status: Status) -> Self {
        Self(status.into())
    }
}

impl From<Fmi2Status> for Result<Fmi2Res, Fmi2Error> {
    fn from(Fmi2Status(status): Fmi2Status) -> Self {
        match Status::try_from(status)? {
            Status::OK => Ok(Fmi2Res::OK),
            Status::Warning => Ok(Fmi2Res::Warning),
            Status::Pending => Ok(Fmi2Res::Pending),
            Status::Discard => Err(Fmi2Error::Discard),
            Status::Error => Err(Fmi2Error::Error),
            Status::Fatal => Err(Fmi2Error::Fatal),
        }
    }
}
