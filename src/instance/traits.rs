//! Traits for the Co-Simulation instance interface ([`Common`], [`CoSimulation`]).

use crate::{Error, Fmi2Res, Status, StatusKind, ValueReference};

/// Interface shared by every FMI 2.0 instance type.
///
/// Every call that reaches the FMU returns its status: `OK`, `Warning` and `Pending` as
/// [`Fmi2Res`], everything else as [`Error::Fmi2`]. Calls the current
/// [`crate::LifecycleState`] forbids fail with [`crate::InvalidArgument::IllegalState`] without
/// reaching the FMU.
pub trait Common {
    /// The FMI-standard version string
    fn get_version(&self) -> Result<&str, Error>;

    fn get_types_platform(&self) -> Result<&str, Error>;

    /// Turn debug logging of the FMU on or off, restricted to `categories` if not empty.
    fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str])
        -> Result<Fmi2Res, Error>;

    /// Informs the FMU to setup the experiment. This function can be called after `instantiate()`
    /// and before `enter_initialization_mode()` is called.
    ///
    /// ## Tolerance control
    /// If tolerance = Some(..) then the communication interval of the slave is controlled by error
    /// estimation. In case the slave utilizes a numerical integrator with variable step size and
    /// error estimation, it is suggested to use `tolerance` for the error estimation of the
    /// internal integrator (usually as relative tolerance). An FMU for Co-Simulation might ignore
    /// this argument.
    ///
    /// ## Start and Stop times
    /// The arguments `start_time` and `stop_time` can be used to check whether the model is valid
    /// within the given boundaries. If `stop_time` is `Some(..)`, then `stop_time` is the defined
    /// final value of the independent variable and if the environment tries to compute past
    /// `stop_time` the FMU has to return `Error`. If `stop_time` is `None`, then no final value of
    /// the independent variable is defined.
    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<Fmi2Res, Error>;

    /// Informs the FMU to enter Initialization Mode.
    ///
    /// Before calling this function, all variables with attribute
    /// `<ScalarVariable initial = "exact" or "approx">` can be set with the `set_*()` functions.
    fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Error>;

    /// Informs the FMU to exit Initialization Mode. Communication steps may be computed
    /// afterwards.
    fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Error>;

    /// Informs the FMU that the simulation run is terminated.
    ///
    /// After calling this function, the final values of all variables can be inquired with the
    /// `get_*()` functions.
    fn terminate(&mut self) -> Result<Fmi2Res, Error>;

    /// Is called by the environment to reset the FMU after a simulation run.
    ///
    /// The FMU goes into the same state as if fmi2Instantiate would have been called. All
    /// variables have their default values. Before starting a new run, `setup_experiment()` and
    /// `enter_initialization_mode()` have to be called.
    fn reset(&mut self) -> Result<Fmi2Res, Error>;

    /// Get real values, in the order of `vrs`.
    fn get_real(&mut self, vrs: &[ValueReference], values: &mut [f64]) -> Result<Fmi2Res, Error>;

    fn get_integer(&mut self, vrs: &[ValueReference], values: &mut [i32])
        -> Result<Fmi2Res, Error>;

    fn get_boolean(&mut self, vrs: &[ValueReference], values: &mut [bool])
        -> Result<Fmi2Res, Error>;

    /// Get string values. The strings are copied out of the FMU before returning.
    fn get_string(
        &mut self,
        vrs: &[ValueReference],
        values: &mut [String],
    ) -> Result<Fmi2Res, Error>;

    /// Set real values
    ///
    /// # Arguments
    /// * `vrs` - a slice of value references
    /// * `values` - a slice of values to set, of the same length
    fn set_real(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<Fmi2Res, Error>;

    /// Set integer values
    ///
    /// # Arguments
    /// * `vrs` - a slice of value references
    /// * `values` - a slice of values to set, of the same length
    fn set_integer(&mut self, vrs: &[ValueReference], values: &[i32]) -> Result<Fmi2Res, Error>;

    fn set_boolean(&mut self, vrs: &[ValueReference], values: &[bool]) -> Result<Fmi2Res, Error>;

    fn set_string(&mut self, vrs: &[ValueReference], values: &[&str]) -> Result<Fmi2Res, Error>;

    /// It is optionally possible to provide evaluation of partial derivatives for an FMU. For
    /// Co-Simulation, this means to compute the partial derivatives at a particular communication
    /// point. One function is provided to compute directional derivatives. This function can be
    /// used to construct the desired partial derivative matrices.
    fn get_directional_derivative(
        &mut self,
        unknown_vrs: &[ValueReference],
        known_vrs: &[ValueReference],
        dv_known_values: &[f64],
        dv_unknown_values: &mut [f64],
    ) -> Result<Fmi2Res, Error>;
}

pub trait CoSimulation: Common {
    /// The computation of a time step is started.
    ///
    /// Depending on the internal state of the slave and the last call of `do_step(...)`, the slave
    /// has to decide which action is to be done before the step is computed.
    ///
    /// # Arguments
    /// * `current_communication_point` - the current communication point of the master.
    /// * `communication_step_size` - the communication step size, must be positive.
    /// * `no_set_fmu_state_prior_to_current_point` - If true, `set_fmu_state` will no longer be
    ///   called for time instants prior to `current_communication_point`.
    ///
    /// Returns [`Fmi2Res::Pending`] if the slave computes the step asynchronously; poll
    /// [`CoSimulation::do_step_status`] until it completes.
    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Error>;

    /// Cancel a running asynchronous step.
    ///
    /// Can be called if `do_step(...)` returned `Pending` in order to stop the current
    /// asynchronous execution. Afterwards it is only allowed to call the functions `terminate()`
    /// or `reset()`.
    fn cancel_step(&mut self) -> Result<Fmi2Res, Error>;

    /// Inquire into slave status (`fmi2GetStatus`).
    fn get_status(&mut self, kind: StatusKind) -> Result<Status, Error>;

    fn get_real_status(&mut self, kind: StatusKind) -> Result<f64, Error>;

    fn get_integer_status(&mut self, kind: StatusKind) -> Result<i32, Error>;

    fn get_boolean_status(&mut self, kind: StatusKind) -> Result<bool, Error>;

    fn get_string_status(&mut self, kind: StatusKind) -> Result<String, Error>;

    /// Result of the running asynchronous step. `Pending` while it is still being computed.
    fn do_step_status(&mut self) -> Result<Fmi2Res, Error>;

    /// Description of the running asynchronous step.
    fn pending_status(&mut self) -> Result<String, Error>;

    /// End time of the last successfully completed communication step. Can be called after
    /// `do_step(...)` returned `Discard`.
    fn last_successful_time(&mut self) -> Result<f64, Error>;

    /// Whether the slave wants to terminate the simulation. Can be called after `do_step(...)`
    /// returned `Discard`.
    fn terminated(&mut self) -> Result<bool, Error>;

    /// Set derivatives of the given `order` for real inputs, used by the slave to interpolate
    /// them during the next step.
    fn set_real_input_derivatives(
        &mut self,
        vrs: &[ValueReference],
        orders: &[i32],
        values: &[f64],
    ) -> Result<Fmi2Res, Error>;

    /// Get derivatives of the given `order` of real outputs at the end of the last step.
    fn get_real_output_derivatives(
        &mut self,
        vrs: &[ValueReference],
        orders: &[i32],
        values: &mut [f64],
    ) -> Result<Fmi2Res, Error>;
}
