use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use fmi2_cs::ValueReference;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StartValueError {
    #[error("Expected `VR=VALUE`, got `{0}`")]
    MissingSeparator(String),
    #[error("Invalid value reference `{0}`")]
    Reference(String),
    #[error("Invalid value `{value}`: {reason}")]
    Value { value: String, reason: String },
}

/// Parse a start value given as `VR=VALUE`.
pub fn parse_start_value<T>(s: &str) -> Result<(ValueReference, T), StartValueError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let (vr, value) = s
        .split_once('=')
        .ok_or_else(|| StartValueError::MissingSeparator(s.to_owned()))?;
    let vr = vr
        .trim()
        .parse()
        .map_err(|_| StartValueError::Reference(vr.to_owned()))?;
    let value = value.parse().map_err(|e: T::Err| StartValueError::Value {
        value: value.to_owned(),
        reason: e.to_string(),
    })?;
    Ok((vr, value))
}

/// How the recorded outputs are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// A pretty-printed table
    Table,
}

/// Run an FMI 2.0 Co-Simulation FMU binary
#[derive(Debug, Parser)]
#[command(name = "fmi2-run", version, about)]
pub struct RunOptions {
    /// The FMU shared library to load
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// GUID of the FMU, as given in its modelDescription.xml
    #[arg(long)]
    pub guid: String,

    /// The unzipped `resources` directory of the FMU
    #[arg(long)]
    pub resource_dir: Option<PathBuf>,

    /// Name of the instance
    #[arg(long, default_value = "inst1")]
    pub instance_name: String,

    /// Simulation start time
    #[arg(long, default_value_t = 0.0)]
    pub start_time: f64,

    /// Simulation stop time
    #[arg(long, default_value_t = 1.0)]
    pub stop_time: f64,

    /// Communication step size, defaults to 1/1000 of the simulated interval
    #[arg(long)]
    pub step_size: Option<f64>,

    /// Relative tolerance passed to fmi2SetupExperiment
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Real start value as `VR=VALUE`
    #[arg(long = "real", value_name = "VR=VALUE", value_parser = parse_start_value::<f64>)]
    pub reals: Vec<(ValueReference, f64)>,

    /// Integer start value as `VR=VALUE`
    #[arg(long = "integer", value_name = "VR=VALUE", value_parser = parse_start_value::<i32>)]
    pub integers: Vec<(ValueReference, i32)>,

    /// Boolean start value as `VR=true|false`
    #[arg(long = "boolean", value_name = "VR=VALUE", value_parser = parse_start_value::<bool>)]
    pub booleans: Vec<(ValueReference, bool)>,

    /// String start value as `VR=VALUE`
    #[arg(long = "string", value_name = "VR=VALUE", value_parser = parse_start_value::<String>)]
    pub strings: Vec<(ValueReference, String)>,

    /// Real variable to record at every communication point
    #[arg(long = "output", value_name = "VR")]
    pub outputs: Vec<ValueReference>,

    /// Format of the recorded outputs written to stdout
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Ask the FMU to report debug messages
    #[arg(long)]
    pub logging_on: bool,

    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_value() {
        assert_eq!(parse_start_value::<f64>("3=1.5"), Ok((3, 1.5)));
        assert_eq!(parse_start_value::<bool>(" 7=true"), Ok((7, true)));
        assert_eq!(
            parse_start_value::<String>("9=a=b"),
            Ok((9, "a=b".to_owned()))
        );
        assert_eq!(
            parse_start_value::<i32>("4"),
            Err(StartValueError::MissingSeparator("4".to_owned()))
        );
        assert_eq!(
            parse_start_value::<i32>("x=4"),
            Err(StartValueError::Reference("x".to_owned()))
        );
        assert!(matches!(
            parse_start_value::<i32>("4=four"),
            Err(StartValueError::Value { .. })
        ));
    }

    #[test]
    fn test_parse_options() {
        let options = RunOptions::try_parse_from([
            "fmi2-run",
            "model.so",
            "--guid",
            "{g}",
            "--real",
            "0=1",
            "--real",
            "1=2",
            "--string",
            "9=hello",
            "--output",
            "2",
            "-v",
        ])
        .unwrap();
        assert_eq!(options.library, PathBuf::from("model.so"));
        assert_eq!(options.reals, vec![(0, 1.0), (1, 2.0)]);
        assert_eq!(options.strings, vec![(9, "hello".to_owned())]);
        assert_eq!(options.outputs, vec![2]);
        assert_eq!(options.instance_name, "inst1");
        assert_eq!(options.step_size, None);
        assert_eq!(options.format, OutputFormat::Csv);

        let options = RunOptions::try_parse_from([
            "fmi2-run", "model.so", "--guid", "{g}", "--format", "table",
        ])
        .unwrap();
        assert_eq!(options.format, OutputFormat::Table);

        assert!(RunOptions::try_parse_from(["fmi2-run", "model.so"]).is_err());
    }
}
