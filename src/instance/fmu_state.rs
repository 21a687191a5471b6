//! FMU state snapshots (`fmi2GetFMUstate` and friends).

use crate::{binding, Error, Fmi2Error, Fmi2Res, Fmi2Status, InvalidArgument};

use super::{Instance, LifecycleState, Operation, SavedState};

/// Handle to an FMU state owned by the [`Instance`] that produced it.
///
/// Handles cannot be copied. A state is released with [`Instance::free_fmu_state`], or together
/// with its instance.
#[derive(Debug, PartialEq, Eq)]
pub struct FmuState {
    instance: u64,
    slot: usize,
}

impl Instance<'_> {
    fn slot_of(&self, state: &FmuState) -> Result<usize, InvalidArgument> {
        match self.saved_states.get(state.slot) {
            Some(Some(_)) if state.instance == self.id => Ok(state.slot),
            _ => Err(InvalidArgument::ForeignFmuState),
        }
    }

    fn saved(&self, state: &FmuState) -> Result<&SavedState, InvalidArgument> {
        let slot = self.slot_of(state)?;
        self.saved_states[slot]
            .as_ref()
            .ok_or(InvalidArgument::ForeignFmuState)
    }

    fn store(&mut self, saved: SavedState) -> FmuState {
        let slot = match self.saved_states.iter().position(Option::is_none) {
            Some(slot) => {
                self.saved_states[slot] = Some(saved);
                slot
            }
            None => {
                self.saved_states.push(Some(saved));
                self.saved_states.len() - 1
            }
        };
        FmuState {
            instance: self.id,
            slot,
        }
    }

    /// The FMU handed back no state although it reported success.
    fn null_state(&mut self, operation: Operation) -> Error {
        log::error!("{}: {operation} returned a null FMU state", self.name);
        self.transition(LifecycleState::Failed);
        Fmi2Error::Fatal.into()
    }

    /// Number of FMU states currently held by this instance.
    pub fn live_fmu_states(&self) -> usize {
        self.saved_states.iter().flatten().count()
    }

    /// Capture the current state of the FMU in a new snapshot.
    pub fn get_fmu_state(&mut self) -> Result<FmuState, Error> {
        self.guard(Operation::GetFMUstate)?;
        let mut raw: binding::fmi2FMUstate = std::ptr::null_mut();
        let status =
            Fmi2Status(unsafe { self.binding().fmi2GetFMUstate(self.component, &mut raw) });
        self.track(Operation::GetFMUstate, status, None)?;
        if raw.is_null() {
            return Err(self.null_state(Operation::GetFMUstate));
        }
        log::trace!("{}: captured FMU state {raw:?}", self.name);
        Ok(self.store(SavedState {
            raw,
            captured_in: Some(self.state),
        }))
    }

    /// Overwrite an existing snapshot with the current state of the FMU.
    pub fn update_fmu_state(&mut self, state: &mut FmuState) -> Result<Fmi2Res, Error> {
        self.guard(Operation::GetFMUstate)?;
        let slot = self.slot_of(state)?;
        let mut raw = self.saved(state)?.raw;
        let status =
            Fmi2Status(unsafe { self.binding().fmi2GetFMUstate(self.component, &mut raw) });
        let res = self.track(Operation::GetFMUstate, status, None)?;
        if raw.is_null() {
            return Err(self.null_state(Operation::GetFMUstate));
        }
        self.saved_states[slot] = Some(SavedState {
            raw,
            captured_in: Some(self.state),
        });
        Ok(res)
    }

    /// Restore a snapshot taken from this instance or deserialized into it.
    ///
    /// Also allowed after a call returned `Error`. The instance returns to the mode the snapshot
    /// was captured in; deserialized snapshots resume in the current mode, or in step mode when
    /// recovering from an error. The monotonic-time check of `do_step` starts over.
    pub fn set_fmu_state(&mut self, state: &FmuState) -> Result<Fmi2Res, Error> {
        self.guard(Operation::SetFMUstate)?;
        let saved = self.saved(state)?;
        let (raw, captured_in) = (saved.raw, saved.captured_in);
        let status = Fmi2Status(unsafe { self.binding().fmi2SetFMUstate(self.component, raw) });
        let next = match (captured_in, self.state) {
            (Some(captured), _) => captured,
            (None, LifecycleState::Error) => LifecycleState::StepMode,
            (None, current) => current,
        };
        let res = self.track(Operation::SetFMUstate, status, Some(next))?;
        self.next_communication_point = None;
        Ok(res)
    }

    /// Release a snapshot.
    ///
    /// Once the instance has failed the FMU is not called any more: the handle is forgotten and
    /// the memory the FMU holds for the snapshot is leaked. `fmi2FreeInstance` is still expected
    /// to reclaim it, but that is up to the FMU.
    pub fn free_fmu_state(&mut self, state: FmuState) -> Result<Fmi2Res, Error> {
        if self.state != LifecycleState::Failed {
            self.guard(Operation::FreeFMUstate)?;
        }
        let slot = self.slot_of(&state)?;
        let Some(SavedState { mut raw, .. }) = self.saved_states[slot].take() else {
            return Err(InvalidArgument::ForeignFmuState.into());
        };
        if self.state == LifecycleState::Failed {
            log::warn!("{}: leaking FMU state {raw:?} of failed component", self.name);
            return Ok(Fmi2Res::OK);
        }
        let status =
            Fmi2Status(unsafe { self.binding().fmi2FreeFMUstate(self.component, &mut raw) });
        self.track(Operation::FreeFMUstate, status, None)
    }

    /// Size in bytes of the serialized form of `state`.
    pub fn serialized_fmu_state_size(&mut self, state: &FmuState) -> Result<usize, Error> {
        self.guard(Operation::SerializeFMUstate)?;
        let raw = self.saved(state)?.raw;
        let mut size = 0;
        let status = Fmi2Status(unsafe {
            self.binding()
                .fmi2SerializedFMUstateSize(self.component, raw, &mut size)
        });
        self.track(Operation::SerializeFMUstate, status, None)?;
        Ok(size)
    }

    /// Serialize `state` into an opaque byte vector.
    pub fn serialize_fmu_state(&mut self, state: &FmuState) -> Result<Vec<u8>, Error> {
        let size = self.serialized_fmu_state_size(state)?;
        let raw = self.saved(state)?.raw;
        let mut bytes = vec![0u8; size];
        let status = Fmi2Status(unsafe {
            self.binding().fmi2SerializeFMUstate(
                self.component,
                raw,
                bytes.as_mut_ptr() as *mut binding::fmi2Byte,
                bytes.len(),
            )
        });
        self.track(Operation::SerializeFMUstate, status, None)?;
        Ok(bytes)
    }

    /// Deserialize bytes produced by [`Instance::serialize_fmu_state`] into a new snapshot,
    /// possibly on a different instance of the same FMU.
    pub fn deserialize_fmu_state(&mut self, bytes: &[u8]) -> Result<FmuState, Error> {
        self.guard(Operation::DeSerializeFMUstate)?;
        let mut raw: binding::fmi2FMUstate = std::ptr::null_mut();
        let status = Fmi2Status(unsafe {
            self.binding().fmi2DeSerializeFMUstate(
                self.component,
                bytes.as_ptr() as *const binding::fmi2Byte,
                bytes.len(),
                &mut raw,
            )
        });
        self.track(Operation::DeSerializeFMUstate, status, None)?;
        if raw.is_null() {
            return Err(self.null_state(Operation::DeSerializeFMUstate));
        }
        Ok(self.store(SavedState {
            raw,
            captured_in: None,
        }))
    }
}
