//! The FMI 2.0 Co-Simulation state machine.

use std::fmt;

/// Lifecycle state of an [`super::Instance`].
///
/// The state before `fmi2Instantiate` is the [`crate::Fmu`] itself; an `Instance` starts out
/// [`LifecycleState::Instantiated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Created by `fmi2Instantiate` or returned to by `fmi2Reset`.
    Instantiated,
    /// Between `fmi2EnterInitializationMode` and `fmi2ExitInitializationMode`.
    InitializationMode,
    /// Initialized; communication steps may be computed.
    StepMode,
    /// `fmi2DoStep` returned `Pending` and has not completed yet.
    StepInProgress,
    /// An asynchronous step was cancelled; only `terminate` and `reset` remain.
    StepCanceled,
    /// `fmi2Terminate` completed.
    Terminated,
    /// A call returned `fmi2Error`. Recoverable through `reset`, `terminate` or restoring an
    /// FMU state.
    Error,
    /// A call returned `fmi2Fatal`. Only freeing the instance remains.
    Failed,
    /// The component has been released.
    Freed,
}

/// Every call an [`super::Instance`] may forward to the FMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetDebugLogging,
    SetupExperiment,
    EnterInitializationMode,
    ExitInitializationMode,
    Terminate,
    Reset,
    FreeInstance,
    GetReal,
    GetInteger,
    GetBoolean,
    GetString,
    SetReal,
    SetInteger,
    SetBoolean,
    SetString,
    GetFMUstate,
    SetFMUstate,
    FreeFMUstate,
    SerializeFMUstate,
    DeSerializeFMUstate,
    GetDirectionalDerivative,
    SetRealInputDerivatives,
    GetRealOutputDerivatives,
    DoStep,
    CancelStep,
    GetStatus,
}

impl fmt::Display for Operation {
    /// The name of the FMI entry point, e.g. `fmi2DoStep`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fmi2{self:?}")
    }
}

impl LifecycleState {
    /// Whether `operation` may be forwarded to the FMU in this state.
    pub fn permits(self, operation: Operation) -> bool {
        use LifecycleState as S;
        use Operation as Op;

        match (self, operation) {
            (S::Freed, _) => false,
            (_, Op::FreeInstance) => matches!(self, S::Terminated | S::Failed),
            (S::Failed, _) => false,

            (_, Op::SetDebugLogging | Op::Reset | Op::FreeFMUstate) => true,

            (S::Instantiated, Op::SetupExperiment | Op::EnterInitializationMode) => true,
            (S::InitializationMode, Op::ExitInitializationMode) => true,

            (
                S::Instantiated | S::InitializationMode | S::StepMode,
                Op::SetReal | Op::SetInteger | Op::SetBoolean | Op::SetString,
            ) => true,
            (
                S::StepMode | S::Terminated,
                Op::GetReal | Op::GetInteger | Op::GetBoolean | Op::GetString,
            ) => true,

            (
                S::InitializationMode | S::StepMode,
                Op::GetFMUstate | Op::SerializeFMUstate | Op::DeSerializeFMUstate,
            ) => true,
            (S::InitializationMode | S::StepMode | S::Error, Op::SetFMUstate) => true,

            (
                S::StepMode,
                Op::DoStep
                | Op::GetDirectionalDerivative
                | Op::SetRealInputDerivatives
                | Op::GetRealOutputDerivatives,
            ) => true,
            (S::StepInProgress, Op::CancelStep) => true,
            (S::StepMode | S::StepInProgress | S::StepCanceled | S::Error, Op::GetStatus) => true,
            (S::StepMode | S::StepCanceled | S::Error, Op::Terminate) => true,

            _ => false,
        }
    }

    /// Whether the component is still allocated.
    pub fn is_live(self) -> bool {
        self != LifecycleState::Freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use LifecycleState as S;
    use Operation as Op;

    #[test]
    fn test_display() {
        assert_eq!(Op::DoStep.to_string(), "fmi2DoStep");
        assert_eq!(Op::GetFMUstate.to_string(), "fmi2GetFMUstate");
    }

    #[test]
    fn test_initialization_sequence() {
        assert!(S::Instantiated.permits(Op::SetupExperiment));
        assert!(S::Instantiated.permits(Op::EnterInitializationMode));
        assert!(S::Instantiated.permits(Op::SetReal));
        assert!(!S::Instantiated.permits(Op::GetReal));
        assert!(!S::Instantiated.permits(Op::DoStep));
        assert!(!S::Instantiated.permits(Op::ExitInitializationMode));

        assert!(S::InitializationMode.permits(Op::ExitInitializationMode));
        assert!(S::InitializationMode.permits(Op::SetString));
        assert!(!S::InitializationMode.permits(Op::SetupExperiment));
        assert!(!S::InitializationMode.permits(Op::DoStep));
    }

    #[test]
    fn test_step_mode() {
        for op in [
            Op::DoStep,
            Op::GetReal,
            Op::SetBoolean,
            Op::GetFMUstate,
            Op::GetDirectionalDerivative,
            Op::GetStatus,
            Op::Terminate,
        ] {
            assert!(S::StepMode.permits(op), "{op} should be allowed");
        }
        assert!(!S::StepMode.permits(Op::CancelStep));
        assert!(!S::StepMode.permits(Op::FreeInstance));
        assert!(!S::StepMode.permits(Op::EnterInitializationMode));
    }

    #[test]
    fn test_pending_step() {
        assert!(S::StepInProgress.permits(Op::CancelStep));
        assert!(S::StepInProgress.permits(Op::GetStatus));
        assert!(!S::StepInProgress.permits(Op::GetReal));
        assert!(!S::StepInProgress.permits(Op::DoStep));
        assert!(S::StepCanceled.permits(Op::Terminate));
        assert!(S::StepCanceled.permits(Op::Reset));
        assert!(!S::StepCanceled.permits(Op::DoStep));
    }

    #[test]
    fn test_terminal_states() {
        assert!(S::Terminated.permits(Op::FreeInstance));
        assert!(S::Terminated.permits(Op::GetReal));
        assert!(!S::Terminated.permits(Op::SetReal));

        assert!(S::Failed.permits(Op::FreeInstance));
        for op in [Op::Reset, Op::Terminate, Op::GetReal, Op::FreeFMUstate] {
            assert!(!S::Failed.permits(op), "{op} should be rejected");
        }

        assert!(S::Error.permits(Op::Reset));
        assert!(S::Error.permits(Op::Terminate));
        assert!(S::Error.permits(Op::SetFMUstate));
        assert!(!S::Error.permits(Op::DoStep));

        for op in [Op::FreeInstance, Op::SetDebugLogging, Op::FreeFMUstate] {
            assert!(!S::Freed.permits(op));
        }
    }
}
