//! The co-simulation main loop.

use std::{io::Write, sync::Arc};

use arrow::{
    array::{ArrayRef, Float64Array, Float64Builder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use fmi2_cs::{
    CoSimulation as _, Common as _, Fmi2Error, Fmi2Res, Fmu, Instance, InstantiateOptions,
    ValueReference,
};

use crate::{options::RunOptions, params::SimParams, Error};

/// Start values applied during initialization mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartValues {
    pub reals: Vec<(ValueReference, f64)>,
    pub integers: Vec<(ValueReference, i32)>,
    pub booleans: Vec<(ValueReference, bool)>,
    pub strings: Vec<(ValueReference, String)>,
}

impl StartValues {
    pub fn from_options(options: &RunOptions) -> Self {
        Self {
            reals: options.reals.clone(),
            integers: options.integers.clone(),
            booleans: options.booleans.clone(),
            strings: options.strings.clone(),
        }
    }

    fn apply(&self, inst: &mut Instance) -> Result<(), fmi2_cs::Error> {
        if !self.reals.is_empty() {
            let (vrs, values): (Vec<_>, Vec<_>) = self.reals.iter().copied().unzip();
            inst.set_real(&vrs, &values)?;
        }
        if !self.integers.is_empty() {
            let (vrs, values): (Vec<_>, Vec<_>) = self.integers.iter().copied().unzip();
            inst.set_integer(&vrs, &values)?;
        }
        if !self.booleans.is_empty() {
            let (vrs, values): (Vec<_>, Vec<_>) = self.booleans.iter().copied().unzip();
            inst.set_boolean(&vrs, &values)?;
        }
        if !self.strings.is_empty() {
            let (vrs, values): (Vec<_>, Vec<_>) = self
                .strings
                .iter()
                .map(|(vr, value)| (*vr, value.as_str()))
                .unzip();
            inst.set_string(&vrs, &values)?;
        }
        Ok(())
    }
}

/// Schema of the recorded outputs: `time`, then one Float64 column per value reference.
pub fn output_schema(references: &[ValueReference]) -> Schema {
    let fields = std::iter::once(Field::new("time", DataType::Float64, false))
        .chain(
            references
                .iter()
                .map(|vr| Field::new(vr.to_string(), DataType::Float64, false)),
        )
        .collect::<Vec<_>>();
    Schema::new(fields)
}

/// Real outputs sampled at each communication point.
struct Recording {
    output_schema: Schema,
    references: Vec<ValueReference>,
    time: Float64Builder,
    recorders: Vec<Float64Builder>,
}

impl Recording {
    fn new(references: &[ValueReference], num_points: usize) -> Self {
        Self {
            output_schema: output_schema(references),
            references: references.to_vec(),
            time: Float64Builder::with_capacity(num_points),
            recorders: references
                .iter()
                .map(|_| Float64Builder::with_capacity(num_points))
                .collect(),
        }
    }

    fn record(&mut self, time: f64, inst: &mut Instance) -> Result<(), fmi2_cs::Error> {
        log::trace!("Recording variables at time {time}");
        let mut values = vec![0.0; self.references.len()];
        if !values.is_empty() {
            inst.get_real(&self.references, &mut values)?;
        }
        self.time.append_value(time);
        for (recorder, value) in self.recorders.iter_mut().zip(values) {
            recorder.append_value(value);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<RecordBatch, ArrowError> {
        let columns = std::iter::once(&mut self.time)
            .chain(self.recorders.iter_mut())
            .map(|builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(self.output_schema), columns)
    }
}

/// The recorded column of `vr`, if it was an output.
pub fn column(output: &RecordBatch, vr: ValueReference) -> Option<Vec<f64>> {
    let array = output
        .column_by_name(&vr.to_string())?
        .as_any()
        .downcast_ref::<Float64Array>()?;
    Some(array.values().to_vec())
}

/// Write the recorded outputs as CSV with a header row.
pub fn write_csv(output: &RecordBatch, writer: impl Write) -> Result<(), ArrowError> {
    let mut writer = arrow::csv::Writer::new(writer);
    writer.write(output)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub num_steps: usize,
    pub end_time: f64,
    /// The FMU asked to terminate before the stop time
    pub terminated_early: bool,
}

/// Run `fmu` from `params.start_time` to `params.stop_time`.
pub fn co_simulation(
    fmu: &Fmu,
    instance_name: &str,
    instantiate_options: &InstantiateOptions,
    params: &SimParams,
    start_values: &StartValues,
    outputs: &[ValueReference],
) -> Result<(SimStats, RecordBatch), Error> {
    log::trace!("Instantiating CS Simulation: {params:#?}");
    let mut inst = fmu.instantiate_cs(instance_name, instantiate_options)?;

    inst.setup_experiment(params.tolerance, params.start_time, Some(params.stop_time))?;
    inst.enter_initialization_mode()?;
    start_values.apply(&mut inst)?;
    inst.exit_initialization_mode()?;

    let mut recording = Recording::new(outputs, params.num_points());
    let stats = main_loop(&mut inst, params, &mut recording)?;

    inst.terminate()?;
    inst.free_instance()?;

    log::info!(
        "Simulated {} steps up to t = {}",
        stats.num_steps,
        stats.end_time
    );
    Ok((stats, recording.finish()?))
}

fn main_loop(
    inst: &mut Instance,
    params: &SimParams,
    recording: &mut Recording,
) -> Result<SimStats, Error> {
    let mut stats = SimStats::default();

    loop {
        let time = params.time_at(stats.num_steps);
        recording.record(time, inst)?;

        if params.is_done(time) {
            stats.end_time = time;
            break;
        }

        let step_size = params.step_size.min(params.stop_time - time);
        match inst.do_step(time, step_size, true) {
            Ok(Fmi2Res::Pending) => await_step(inst)?,
            Ok(_) => {}
            Err(e) if e.fmi2_error() == Some(Fmi2Error::Discard) => {
                if inst.terminated()? {
                    let time = inst.last_successful_time()?;
                    log::info!("FMU terminated the simulation at t = {time}");
                    recording.record(time, inst)?;
                    stats.end_time = time;
                    stats.terminated_early = true;
                    break;
                }
                return Err(Error::StepDiscarded(time));
            }
            Err(e) => return Err(e.into()),
        }

        stats.num_steps += 1;
    }

    Ok(stats)
}

/// Poll an asynchronous step until it completes.
fn await_step(inst: &mut Instance) -> Result<(), Error> {
    loop {
        match inst.do_step_status()? {
            Fmi2Res::Pending => {
                log::trace!("Step pending: {}", inst.pending_status()?);
                std::thread::yield_now();
            }
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_schema() {
        let schema = output_schema(&[2, 3]);
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, ["time", "2", "3"]);
        assert!(schema
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Float64 && !f.is_nullable()));
    }

    #[test]
    fn test_empty_recording() {
        let output = Recording::new(&[2], 4).finish().unwrap();
        assert_eq!(output.num_rows(), 0);
        assert_eq!(column(&output, 2), Some(vec![]));

        let table = arrow::util::pretty::pretty_format_batches(&[output])
            .unwrap()
            .to_string();
        assert!(table.contains("time"));
    }
}
