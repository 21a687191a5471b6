use arrow::record_batch::RecordBatch;
use assert_approx_eq::assert_approx_eq;
use clap::Parser as _;
use fmi2_cs::Fmu;
use fmi2_run::{
    options::RunOptions,
    sim::{column, write_csv, SimStats},
    simulate_fmu, Error,
};
use fmi2_stub::vr;

fn run(args: &[&str]) -> Result<(SimStats, RecordBatch), Error> {
    let fmu = Fmu::from_module(fmi2_stub::static_module()).unwrap();
    let options = RunOptions::try_parse_from(
        ["fmi2-run", "stub.so", "--guid", fmi2_stub::GUID]
            .iter()
            .chain(args),
    )
    .unwrap();
    simulate_fmu(&fmu, &options)
}

#[test_log::test]
fn test_adder() {
    let (stats, output) = run(&[
        "--real",
        "0=1.0",
        "--real",
        "1=1.0",
        "--output",
        "2",
        "--output",
        "3",
    ])
    .unwrap();

    assert_eq!(stats.num_steps, 1000);
    assert!(!stats.terminated_early);
    assert_approx_eq!(stats.end_time, 1.0, 1e-9);
    assert_eq!(output.num_rows(), 1001);
    assert_eq!(output.num_columns(), 3);
    assert_eq!(output.schema().field(0).name(), "time");

    let sum = column(&output, vr::REAL_SUM).unwrap();
    assert!(sum.iter().all(|v| *v == 2.0));
    let integral = column(&output, vr::REAL_INTEGRAL).unwrap();
    assert_eq!(integral[0], 0.0);
    assert_approx_eq!(integral[500], 1.0, 1e-9);
    assert_approx_eq!(integral[1000], 2.0, 1e-9);
    assert!(column(&output, vr::REAL_A).is_none());

    let mut csv = Vec::new();
    write_csv(&output, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("time,2,3"));
    let first: Vec<f64> = lines
        .next()
        .unwrap()
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(first, [0.0, 2.0, 0.0]);
    assert_eq!(lines.count(), 1000);
}

#[test_log::test]
fn test_start_values() {
    let (_, output) = run(&[
        "--stop-time",
        "0.1",
        "--step-size",
        "0.05",
        "--integer",
        "3=40",
        "--integer",
        "4=2",
        "--boolean",
        "7=true",
        "--string",
        "9=x",
        "--output",
        "4",
    ])
    .unwrap();
    let time = column(&output, vr::REAL_TIME).unwrap();
    assert_eq!(time.len(), 3);
    assert_approx_eq!(time[2], 0.1, 1e-12);
}

#[test_log::test]
fn test_max_step_discard() {
    let err = run(&["--real", "5=0.0001"]).unwrap_err();
    assert!(matches!(err, Error::StepDiscarded(t) if t == 0.0));
}

#[test_log::test]
fn test_asynchronous_steps() {
    let (stats, output) = run(&[
        "--stop-time",
        "0.5",
        "--step-size",
        "0.1",
        "--integer",
        "6=3",
        "--real",
        "0=2",
        "--output",
        "3",
    ])
    .unwrap();
    assert_eq!(stats.num_steps, 5);
    let integral = column(&output, vr::REAL_INTEGRAL).unwrap();
    assert_approx_eq!(integral[5], 1.0, 1e-12);
}

#[test_log::test]
fn test_invalid_start_value() {
    let err = run(&["--real", "2=1.0"]).unwrap_err();
    assert_eq!(
        match err {
            Error::Fmi(e) => e.fmi2_error(),
            _ => None,
        },
        Some(fmi2_cs::Fmi2Error::Error)
    );
}
