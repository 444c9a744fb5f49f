//! Batch runner: load both datasets, fit the SEIHRD model, report.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use seihrd_calibration::{fit, ExtractedSeries, FitResult, LikelihoodEvaluator};
use seihrd_data::{DatasetSpec, ObservedSeries, TimeSeriesProvider};
use seihrd_ode::Simulator;
use serde::Serialize;
use simple_logger::SimpleLogger;

mod config;
use config::FitConfig;

#[derive(Parser)]
#[command(version, about = "Fit the age-stratified SEIHRD model to hospital and death counts")]
struct Args {
    /// Path to a JSON fit configuration; England 2020 defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the fit result and simulated series as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging and per-iteration optimizer output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct FitReport<'a> {
    config: &'a FitConfig,
    result: &'a FitResult,
    series: ExtractedSeries,
}

fn run(config: &FitConfig) -> Result<FitResult> {
    let window = config.window();

    let hospital = TimeSeriesProvider::new(DatasetSpec::hospital_admissions(), window)
        .load(&config.hospital_data)
        .context("failed to load hospital admissions")?;
    let deaths = TimeSeriesProvider::new(DatasetSpec::deaths_by_age(), window)
        .load(&config.deaths_data)
        .context("failed to load deaths")?;

    let grid = config.grid()?;
    let observed = ObservedSeries::align(grid, &hospital, &deaths, config.missing)
        .context("observed data does not cover the simulation grid")?;

    let simulator = Simulator::new(
        config.population,
        &config.initial_conditions,
        config.integrator,
    )
    .context("invalid initial conditions")?;
    info!("Integrator: {}", simulator.integrator());

    let evaluator = LikelihoodEvaluator::new(simulator, observed, config.likelihood)?;
    let result = fit(evaluator, &config.prior, config.bounds, &config.optimizer)?;
    Ok(result)
}

fn log_summary(result: &FitResult) {
    info!(
        "Fit finished: converged = {}, reason = {}, {} iterations, {} evaluations",
        result.converged, result.termination_reason, result.iterations, result.cost_evaluations
    );
    info!(
        "Log-likelihood: {:.6} (initial {:.6})",
        result.log_likelihood, result.initial_log_likelihood
    );
    for (name, value) in seihrd_core::ParameterSet::slot_names()
        .iter()
        .zip(result.parameters.to_vec())
    {
        info!("  {:<16} {:.8}", name, value);
    }
}

fn write_report(path: &Path, config: &FitConfig, result: &FitResult) -> Result<()> {
    let report = FitReport {
        config,
        result,
        series: ExtractedSeries::from_trajectory(&result.trajectory),
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    info!("Wrote results to '{}'", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let mut config = match &args.config {
        Some(path) => FitConfig::load(path)?,
        None => FitConfig::default(),
    };
    if args.verbose {
        config.optimizer = config.optimizer.with_verbose(true);
    }

    let result = run(&config)?;
    log_summary(&result);

    if let Some(path) = &args.output {
        write_report(path, &config, &result)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use seihrd_calibration::{NelderMeadConfig, OptimizationConfig};
    use std::fs;

    fn hospital_json(first: NaiveDate, days: i64) -> String {
        let records: Vec<String> = (0..days)
            .map(|day| {
                let date = first + Duration::days(day);
                let v = (10 * (day + 1)) as f64;
                format!(
                    r#"{{"date": "{}", "cumAdmissionsByAge": [
                        {{"age": "0_to_5", "value": {}}}, {{"age": "6_to_17", "value": {}}},
                        {{"age": "18_to_64", "value": {}}},
                        {{"age": "65_to_84", "value": {}}}, {{"age": "85+", "value": {}}}]}}"#,
                    date,
                    v,
                    v,
                    4.0 * v,
                    3.0 * v,
                    v
                )
            })
            .collect();
        format!(r#"{{"data": [{}]}}"#, records.join(","))
    }

    fn deaths_json(first: NaiveDate, days: i64) -> String {
        let records: Vec<String> = (0..days)
            .map(|day| {
                let date = first + Duration::days(day);
                format!(
                    r#"{{"date": "{}", "newDeaths28DaysByDeathDateAgeDemographics": [
                        {{"age": "10_14", "deaths": 1}}, {{"age": "40_44", "deaths": 2}},
                        {{"age": "80_84", "deaths": 5}}, {{"age": "60+", "deaths": 99}}]}}"#,
                    date
                )
            })
            .collect();
        format!(r#"{{"data": [{}]}}"#, records.join(","))
    }

    #[test]
    fn test_run_end_to_end_and_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let first = NaiveDate::from_ymd_opt(2020, 3, 19).unwrap();
        fs::write(dir.path().join("hospital.json"), hospital_json(first, 15)).unwrap();
        fs::write(dir.path().join("deaths.json"), deaths_json(first, 15)).unwrap();

        let config = FitConfig {
            hospital_data: dir.path().join("hospital.json"),
            deaths_data: dir.path().join("deaths.json"),
            window_start: first,
            window_end: first + Duration::days(14),
            optimizer: OptimizationConfig::NelderMead(
                NelderMeadConfig::new().with_max_iterations(5),
            ),
            ..FitConfig::default()
        };

        let result = run(&config).unwrap();
        assert_eq!(result.trajectory.len(), 14);
        assert!(result.log_likelihood >= result.initial_log_likelihood);

        let output = dir.path().join("result.json");
        write_report(&output, &config, &result).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["series"]["dates"][0], "2020-03-20");
        assert_eq!(report["series"]["series"].as_array().unwrap().len(), 18);
        assert!(report["result"]["iterations"].as_u64().unwrap() <= 5);
    }

    #[test]
    fn test_missing_data_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = FitConfig {
            hospital_data: dir.path().join("absent.json"),
            ..FitConfig::default()
        };
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("hospital admissions"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["seihrd-fit", "--config", "fit.json", "-v"]);
        assert_eq!(args.config, Some(PathBuf::from("fit.json")));
        assert!(args.output.is_none());
        assert!(args.verbose);
    }
}
