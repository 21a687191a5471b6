//! Resolution of the FMI 2.0 entry points from a module.

use fmi2_cs::{sys::StaticModule, Error, Fmu, InstantiateOptions, InvalidArgument};

#[test_log::test]
fn test_resolve_stub() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    assert_eq!(fmu.get_version().unwrap(), "2.0");
    assert_eq!(fmu.get_types_platform().unwrap(), "default");
    fmu.check_consistency().unwrap();
    assert_eq!(fmu.live_instances(), 0);
    assert!(format!("{fmu:?}").contains("fmi2-stub"));
}

#[test_log::test]
fn test_missing_symbol() {
    let mut module = fmi2_stub::static_module();
    module.remove("fmi2SerializeFMUstate");

    match Fmu::from_module(module) {
        Err(Error::MissingSymbol(e)) => {
            assert_eq!(e.name, "fmi2SerializeFMUstate");
            assert!(e.module.contains("fmi2-stub"));
        }
        other => panic!("Expected a missing symbol, got {other:?}"),
    }
}

#[test_log::test]
fn test_empty_module() {
    let err = Fmu::from_module(StaticModule::new("empty")).unwrap_err();
    assert!(matches!(err, Error::MissingSymbol(ref e) if e.name == "fmi2GetTypesPlatform"));
    assert_eq!(
        err.to_string(),
        "Entry point `fmi2GetTypesPlatform` not found in static module 'empty'"
    );
}

/// The `cdylib` build of the stub, placed by cargo next to (or one level above) the test binary.
#[cfg(feature = "dynamic")]
fn stub_library() -> std::path::PathBuf {
    use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};

    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let prefix = format!("{DLL_PREFIX}fmi2_stub");
    let found = [deps, deps.parent().unwrap()]
        .into_iter()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(DLL_SUFFIX))
        })
        .unwrap_or_else(|| panic!("{prefix}*{DLL_SUFFIX} not found next to {exe:?}"));
    found
}

#[cfg(feature = "dynamic")]
#[test_log::test]
fn test_shared_library_symbols() {
    use fmi2_cs::{
        binding::Fmi2Binding,
        sys::{Module as _, SharedLibrary},
    };

    let path = stub_library();
    let library = SharedLibrary::open(&path).unwrap();
    assert_eq!(library.describe(), path.display().to_string());
    for name in Fmi2Binding::SYMBOLS {
        assert!(library.lookup(name).is_ok(), "{name} not exported");
    }
    assert!(library.lookup("fmi3DoStep").is_err());
    library.close().unwrap();
}

#[cfg(feature = "dynamic")]
#[test_log::test]
fn test_shared_library_cycle() {
    use fmi2_cs::{CoSimulation as _, Common as _, Fmi2Res};

    let fmu = Fmu::from_path(stub_library()).unwrap();
    assert_eq!(fmu.get_version().unwrap(), "2.0");
    fmu.check_consistency().unwrap();

    let options = InstantiateOptions::new(fmi2_stub::GUID).logging_on(true);
    let mut inst = fmu.instantiate_cs("dynamic", &options).unwrap();
    inst.setup_experiment(None, 0.0, Some(1.0)).unwrap();
    inst.enter_initialization_mode().unwrap();
    inst.set_real(&[fmi2_stub::vr::REAL_A], &[3.0]).unwrap();
    inst.exit_initialization_mode().unwrap();
    for i in 0..4 {
        assert_eq!(inst.do_step(i as f64 * 0.25, 0.25, true).unwrap(), Fmi2Res::OK);
    }
    let mut integral = [0.0];
    inst.get_real(&[fmi2_stub::vr::REAL_INTEGRAL], &mut integral)
        .unwrap();
    assert!((integral[0] - 3.0).abs() < 1e-12);

    let state = inst.get_fmu_state().unwrap();
    assert!(!inst.serialize_fmu_state(&state).unwrap().is_empty());
    inst.free_fmu_state(state).unwrap();

    inst.terminate().unwrap();
    inst.free_instance().unwrap();
    drop(inst);
    assert_eq!(fmu.live_instances(), 0);
    // Dropping the `Fmu` closes the library.
    drop(fmu);
}

#[cfg(feature = "dynamic")]
#[test_log::test]
fn test_missing_library() {
    let err = Fmu::from_path("/nonexistent/binaries/linux64/missing.so").unwrap_err();
    assert!(matches!(err, Error::Load(_)), "{err:?}");
}

#[test_log::test]
fn test_instantiate_rejects() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let options = InstantiateOptions::new(fmi2_stub::GUID);

    let err = fmu.instantiate_cs("", &options).unwrap_err();
    assert_eq!(
        err.invalid_argument(),
        Some(&InvalidArgument::EmptyInstanceName)
    );

    let err = fmu
        .instantiate_cs("inst", &InstantiateOptions::new("{wrong-guid}"))
        .unwrap_err();
    assert!(matches!(err, Error::Instantiation { ref name } if name == "inst"));
    assert_eq!(fmu.live_instances(), 0);

    let err = fmu.instantiate_cs("in\0st", &options).unwrap_err();
    assert!(matches!(err, Error::Nul(_)));
}

#[test_log::test]
fn test_live_instances() {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let options = InstantiateOptions::new(fmi2_stub::GUID).logging_on(true);

    let inst1 = fmu.instantiate_cs("inst1", &options).unwrap();
    let inst2 = fmu.instantiate_cs("inst2", &options).unwrap();
    assert_eq!(fmu.live_instances(), 2);
    assert_eq!(inst1.name(), "inst1");
    assert_eq!(inst2.fmu().live_instances(), 2);

    drop(inst1);
    assert_eq!(fmu.live_instances(), 1);
    drop(inst2);
    assert_eq!(fmu.live_instances(), 0);
}
