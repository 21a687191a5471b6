use clap::Parser;
use fmi2_run::{
    options::{OutputFormat, RunOptions},
    sim, simulate,
};

fn main() -> anyhow::Result<()> {
    let options = RunOptions::parse();

    env_logger::Builder::new()
        .filter_level(options.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let (stats, output) = simulate(&options)?;
    match options.format {
        OutputFormat::Csv => sim::write_csv(&output, std::io::stdout().lock())?,
        OutputFormat::Table => println!(
            "{}",
            arrow::util::pretty::pretty_format_batches(&[output])?
        ),
    }

    if stats.terminated_early {
        log::warn!("Simulation ended early at t = {}", stats.end_time);
    }

    Ok(())
}
