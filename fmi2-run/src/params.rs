use crate::{options::RunOptions, Error};

/// Validated time grid of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub start_time: f64,
    pub stop_time: f64,
    pub step_size: f64,
    pub tolerance: Option<f64>,
}

impl SimParams {
    pub fn new_from_options(options: &RunOptions) -> Result<Self, Error> {
        let start_time = options.start_time;
        let stop_time = options.stop_time;

        if stop_time.partial_cmp(&start_time) != Some(std::cmp::Ordering::Greater) {
            return Err(Error::InvalidParams(format!(
                "`stop_time` ({stop_time}) must be greater than `start_time` ({start_time})"
            )));
        }

        let step_size = options
            .step_size
            .unwrap_or_else(|| (stop_time - start_time) / 1000.0);

        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidParams(format!(
                "`step_size` must be positive, got {step_size}"
            )));
        }

        Ok(Self {
            start_time,
            stop_time,
            step_size,
            tolerance: options.tolerance,
        })
    }

    /// Communication point after `steps` steps.
    pub fn time_at(&self, steps: usize) -> f64 {
        self.start_time + steps as f64 * self.step_size
    }

    /// Number of communication points including start and stop, used to size the recording.
    pub fn num_points(&self) -> usize {
        ((self.stop_time - self.start_time) / self.step_size).ceil() as usize + 1
    }

    /// Whether `time` is within rounding of the stop time or past it.
    pub fn is_done(&self, time: f64) -> bool {
        time >= self.stop_time - self.step_size * 1e-6
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn params(args: &[&str]) -> Result<SimParams, Error> {
        let options = RunOptions::try_parse_from(
            ["fmi2-run", "model.so", "--guid", "g"]
                .iter()
                .chain(args),
        )
        .unwrap();
        SimParams::new_from_options(&options)
    }

    #[test]
    fn test_default_step_size() {
        let params = params(&["--stop-time", "2"]).unwrap();
        assert_eq!(params.step_size, 0.002);
        assert_eq!(params.tolerance, None);
        assert!(params.is_done(params.time_at(1000)));
        assert!(!params.is_done(params.time_at(999)));
        assert_eq!(params.num_points(), 1001);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            params(&["--stop-time", "0"]),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            params(&["--step-size=-0.1"]),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            params(&["--step-size", "0"]),
            Err(Error::InvalidParams(_))
        ));
    }
}
