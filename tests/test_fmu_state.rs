//! FMU state snapshots, rollback and serialization.

use assert_approx_eq::assert_approx_eq;
use fmi2_cs::{
    CoSimulation as _, Common as _, Fmi2Res, Fmu, Instance, InstantiateOptions, InvalidArgument,
    LifecycleState, Operation,
};
use fmi2_stub::vr;

/// Every variable of the stub, read back as one comparable record.
#[derive(Debug, PartialEq)]
struct Snapshot {
    reals: [f64; 6],
    integers: [i32; 5],
    booleans: [bool; 5],
    strings: Vec<String>,
}

fn read_all(inst: &mut Instance) -> Snapshot {
    let mut reals = [0.0; 6];
    inst.get_real(&[0, 1, 2, 3, 4, 5], &mut reals).unwrap();
    let mut integers = [0; 5];
    inst.get_integer(&[3, 4, 5, 6, 7], &mut integers).unwrap();
    let mut booleans = [false; 5];
    inst.get_boolean(&[6, 7, 8, 9, 10], &mut booleans).unwrap();
    let mut strings = vec![String::new(); 3];
    inst.get_string(&[9, 10, 11], &mut strings).unwrap();
    Snapshot {
        reals,
        integers,
        booleans,
        strings,
    }
}

fn initialized<'a>(fmu: &'a Fmu, name: &str) -> Instance<'a> {
    let mut inst = fmu
        .instantiate_cs(name, &InstantiateOptions::new(fmi2_stub::GUID))
        .unwrap();
    inst.setup_experiment(None, 0.0, Some(10.0)).unwrap();
    inst.enter_initialization_mode().unwrap();
    inst.exit_initialization_mode().unwrap();
    inst
}

/// Give every variable a non-default value and advance a few steps.
fn populate(inst: &mut Instance) {
    inst.set_real(&[vr::REAL_A, vr::REAL_B], &[1.5, 0.25]).unwrap();
    inst.set_integer(&[vr::INTEGER_A, vr::INTEGER_B], &[-7, 11])
        .unwrap();
    inst.set_boolean(&[vr::BOOLEAN_A, vr::BOOLEAN_B], &[true, false])
        .unwrap();
    inst.set_string(&[vr::STRING_A, vr::STRING_B], &["snap", "shot"])
        .unwrap();
    for i in 0..10 {
        inst.do_step(i as f64 * 0.1, 0.1, false).unwrap();
    }
}

#[test_log::test]
fn test_serialize_onto_fresh_instance() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut original = initialized(&fmu, "original");
    populate(&mut original);

    let state = original.get_fmu_state().unwrap();
    let expected = read_all(&mut original);
    let bytes = original.serialize_fmu_state(&state).unwrap();
    assert_eq!(
        original.serialized_fmu_state_size(&state).unwrap(),
        bytes.len()
    );

    let mut copy = initialized(&fmu, "copy");
    assert_ne!(read_all(&mut copy), expected);

    let restored = copy.deserialize_fmu_state(&bytes).unwrap();
    assert_eq!(copy.set_fmu_state(&restored).unwrap(), Fmi2Res::OK);
    assert_eq!(copy.state(), LifecycleState::StepMode);
    assert_eq!(read_all(&mut copy), expected);
    assert_eq!(expected.strings[2], "snapshot");

    // The restored copy continues from the snapshot time.
    copy.do_step(1.0, 0.1, true).unwrap();
    let mut time = [0.0];
    copy.get_real(&[vr::REAL_TIME], &mut time).unwrap();
    assert_approx_eq!(time[0], 1.1, 1e-12);

    copy.free_fmu_state(restored).unwrap();
    assert_eq!(copy.live_fmu_states(), 0);
    original.free_fmu_state(state).unwrap();
    assert_eq!(original.live_fmu_states(), 0);
}

#[test_log::test]
fn test_rollback() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut inst = initialized(&fmu, "rollback");
    populate(&mut inst);

    let mut state = inst.get_fmu_state().unwrap();
    let at_snapshot = read_all(&mut inst);

    inst.set_real(&[vr::REAL_A], &[100.0]).unwrap();
    inst.do_step(1.0, 0.5, true).unwrap();
    assert_ne!(read_all(&mut inst), at_snapshot);

    inst.set_fmu_state(&state).unwrap();
    assert_eq!(read_all(&mut inst), at_snapshot);

    // Repeating the step from the restored time is allowed again.
    inst.do_step(1.0, 0.25, true).unwrap();
    let later = read_all(&mut inst);

    inst.update_fmu_state(&mut state).unwrap();
    inst.do_step(1.25, 0.25, true).unwrap();
    inst.set_fmu_state(&state).unwrap();
    assert_eq!(read_all(&mut inst), later);
    assert_eq!(inst.live_fmu_states(), 1);

    inst.terminate().unwrap();
    let err = inst.get_fmu_state().unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::IllegalState {
            operation: Operation::GetFMUstate,
            state: LifecycleState::Terminated,
        })
    );
    // Still held states are released together with the instance.
    inst.free_instance().unwrap();
}

#[test_log::test]
fn test_recover_from_error() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut inst = initialized(&fmu, "recover");
    populate(&mut inst);
    let state = inst.get_fmu_state().unwrap();

    assert!(inst.set_string(&[vr::STRING_CONCAT], &["x"]).is_err());
    assert_eq!(inst.state(), LifecycleState::Error);

    inst.set_fmu_state(&state).unwrap();
    assert_eq!(inst.state(), LifecycleState::StepMode);
    inst.do_step(1.0, 0.1, true).unwrap();
}

#[test_log::test]
fn test_foreign_state() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut first = initialized(&fmu, "first");
    let mut second = initialized(&fmu, "second");

    let mut state = first.get_fmu_state().unwrap();
    let err = second.set_fmu_state(&state).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::ForeignFmuState)
    );
    let err = second.update_fmu_state(&mut state).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::ForeignFmuState)
    );
    let err = second.serialized_fmu_state_size(&state).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::ForeignFmuState)
    );
    let err = second.serialize_fmu_state(&state).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::ForeignFmuState)
    );
    // None of the rejected calls reached the FMU.
    assert_eq!(second.state(), LifecycleState::StepMode);
    assert_eq!(second.live_fmu_states(), 0);
    assert!(!first.serialize_fmu_state(&state).unwrap().is_empty());
    let err = second.free_fmu_state(state).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::ForeignFmuState)
    );
    assert_eq!(first.live_fmu_states(), 1);
}

#[test_log::test]
fn test_failed_instance_leaks_states() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut inst = initialized(&fmu, "failed");
    let kept = inst.get_fmu_state().unwrap();
    let freed = inst.get_fmu_state().unwrap();
    assert_eq!(inst.live_fmu_states(), 2);

    inst.set_boolean(&[vr::BOOLEAN_FAIL_NEXT_STEP], &[true])
        .unwrap();
    assert!(inst.do_step(0.0, 0.1, true).is_err());
    assert_eq!(inst.state(), LifecycleState::Failed);

    // Only forgotten on the client side, the FMU is not called any more.
    assert_eq!(inst.free_fmu_state(freed).unwrap(), Fmi2Res::OK);
    assert_eq!(inst.live_fmu_states(), 1);
    inst.free_instance().unwrap();
    assert_eq!(inst.live_fmu_states(), 0);

    let err = inst.set_fmu_state(&kept).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::IllegalState {
            operation: Operation::SetFMUstate,
            state: LifecycleState::Freed
        })
    );
    drop(inst);
    assert_eq!(fmu.live_instances(), 0);
}

#[test_log::test]
fn test_invalid_serialized_state() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut inst = initialized(&fmu, "corrupt");

    let err = inst.deserialize_fmu_state(b"not a state").unwrap_err();
    assert_eq!(err.fmi2_error(), Some(fmi2_cs::Fmi2Error::Error));
    assert_eq!(inst.live_fmu_states(), 0);
    assert_eq!(inst.state(), LifecycleState::Error);
}

#[test_log::test]
fn test_snapshot_in_initialization_mode() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let mut inst = fmu
        .instantiate_cs("init", &InstantiateOptions::new(fmi2_stub::GUID))
        .unwrap();
    inst.setup_experiment(None, 0.0, None).unwrap();
    inst.enter_initialization_mode().unwrap();
    inst.set_real(&[vr::REAL_A], &[4.0]).unwrap();
    let state = inst.get_fmu_state().unwrap();

    inst.exit_initialization_mode().unwrap();
    inst.set_real(&[vr::REAL_A], &[8.0]).unwrap();

    // Restoring returns to the mode the snapshot was taken in.
    inst.set_fmu_state(&state).unwrap();
    assert_eq!(inst.state(), LifecycleState::InitializationMode);
    inst.exit_initialization_mode().unwrap();
    let mut value = [0.0];
    inst.get_real(&[vr::REAL_A], &mut value).unwrap();
    assert_eq!(value[0], 4.0);
}
