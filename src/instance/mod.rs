//! FMI 2.0 Co-Simulation instance interface

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    binding, CallbackFunctions, Error, Fmi2Error, Fmi2Res, Fmi2Status, Fmu, InvalidArgument,
};

mod co_simulation;
mod common;
mod fmu_state;
mod lifecycle;
mod traits;

pub use fmu_state::FmuState;
pub use lifecycle::{LifecycleState, Operation};
pub use traits::{CoSimulation, Common};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

struct SavedState {
    raw: binding::fmi2FMUstate,
    /// Lifecycle state the snapshot was taken in, unknown for deserialized states
    captured_in: Option<LifecycleState>,
}

/// A live FMI 2.0 Co-Simulation component.
///
/// All calls take `&mut self`, so access to one instance is always serialized. The component is
/// released by [`Instance::free_instance`] or, failing that, on drop; FMU states still held by the
/// instance are freed before the component.
pub struct Instance<'a> {
    /// Copy of the instance name
    name: String,
    /// Loaded FMU the component was created from
    fmu: &'a Fmu,
    /// Pointer to the raw FMI 2.0 component, null once freed
    component: binding::fmi2Component,
    state: LifecycleState,
    /// Distinguishes the FMU states of this instance from those of others
    id: u64,
    /// Callbacks struct, must outlive the component
    #[allow(dead_code)]
    callbacks: Box<CallbackFunctions>,
    /// Allocated FMU states, indexed by [`FmuState`]
    saved_states: Vec<Option<SavedState>>,
    /// End of the last accepted communication step
    next_communication_point: Option<f64>,
    /// End of an asynchronous step that has not completed yet
    pending_communication_point: Option<f64>,
}

impl<'a> Instance<'a> {
    /// Copy of the name the instance was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The FMU this instance was created from.
    pub fn fmu(&self) -> &'a Fmu {
        self.fmu
    }

    #[inline]
    fn binding(&self) -> &'a binding::Fmi2Binding {
        self.fmu.binding()
    }

    /// Reject `operation` locally if the current state forbids it.
    fn guard(&self, operation: Operation) -> Result<(), InvalidArgument> {
        if self.state.permits(operation) {
            Ok(())
        } else {
            log::debug!(
                "{}: rejected {operation} in state {:?}",
                self.name,
                self.state
            );
            Err(InvalidArgument::IllegalState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            log::debug!("{}: {:?} -> {:?}", self.name, self.state, next);
            self.state = next;
        }
    }

    /// Interpret the status of `operation`, moving to `next` if the call succeeded.
    ///
    /// `Error` moves the instance to [`LifecycleState::Error`], `Fatal` and unknown statuses to
    /// [`LifecycleState::Failed`]. Every non-OK status is returned to the caller.
    fn track(
        &mut self,
        operation: Operation,
        status: Fmi2Status,
        next: Option<LifecycleState>,
    ) -> Result<Fmi2Res, Error> {
        match status.ok() {
            Ok(res) => {
                match res {
                    Fmi2Res::OK => log::trace!("{}: {operation} -> OK", self.name),
                    Fmi2Res::Warning => log::warn!("{}: {operation} returned Warning", self.name),
                    Fmi2Res::Pending => log::debug!("{}: {operation} is pending", self.name),
                }
                if let Some(next) = next {
                    self.transition(next);
                }
                Ok(res)
            }
            Err(Fmi2Error::Discard) => {
                log::debug!("{}: {operation} returned Discard", self.name);
                Err(Fmi2Error::Discard.into())
            }
            Err(Fmi2Error::Error) => {
                log::error!("{}: {operation} returned Error", self.name);
                if self.state != LifecycleState::Failed {
                    self.transition(LifecycleState::Error);
                }
                Err(Fmi2Error::Error.into())
            }
            Err(e) => {
                log::error!("{}: {operation} failed: {e}", self.name);
                self.transition(LifecycleState::Failed);
                Err(e.into())
            }
        }
    }

    /// Release all FMU states, then the component.
    fn release(&mut self) {
        let binding = self.binding();
        let failed = self.state == LifecycleState::Failed;
        for saved in self.saved_states.iter_mut().filter_map(Option::take) {
            let mut raw = saved.raw;
            if failed {
                log::warn!("{}: leaking FMU state {raw:?} of failed component", self.name);
            } else {
                log::trace!("Freeing FMU state {raw:?}");
                unsafe { binding.fmi2FreeFMUstate(self.component, &mut raw) };
            }
        }
        log::trace!("Freeing component {:?}", self.component);
        unsafe { binding.fmi2FreeInstance(self.component) };
        self.component = std::ptr::null_mut();
        self.transition(LifecycleState::Freed);
    }

    /// Release the component (`fmi2FreeInstance`).
    ///
    /// Allowed after [`Common::terminate`] or once the instance has failed. Afterwards every
    /// call is rejected with [`LifecycleState::Freed`], so the component cannot be freed twice.
    pub fn free_instance(&mut self) -> Result<(), Error> {
        self.guard(Operation::FreeInstance)?;
        self.release();
        Ok(())
    }
}

impl Drop for Instance<'_> {
    fn drop(&mut self) {
        if self.state.is_live() {
            if !matches!(
                self.state,
                LifecycleState::Terminated | LifecycleState::Failed
            ) {
                log::debug!(
                    "{}: dropped in state {:?} without terminating",
                    self.name,
                    self.state
                );
            }
            self.release();
        }
        self.fmu.live_instances.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instance {} {{{:?}, {:?}}}",
            self.name, self.state, self.component,
        )
    }
}

/// Reject parallel arrays of different lengths.
fn check_len(refs: usize, values: usize) -> Result<(), InvalidArgument> {
    if refs == values {
        Ok(())
    } else {
        Err(InvalidArgument::LengthMismatch { refs, values })
    }
}
