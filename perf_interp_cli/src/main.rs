use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use perf_interp::group::group_by;
use perf_interp::{correct_distance, interpolate, PerformanceModel, QueryCondition};
use rayon::prelude::*;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aircraft performance interpolation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a performance model at one or more flight conditions
    Query(QueryArgs),
    /// Apply the ISA atmosphere correction to a baseline figure
    Correct(CorrectArgs),
    /// Summarize a model: axes, outputs, method, curve groups
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct QueryArgs {
    /// Performance model JSON path
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    model: PathBuf,

    /// Output column to interpolate (e.g. distance)
    #[arg(short, long)]
    output: String,

    /// Axis value for a single condition (repeat per axis: `--set temperature=15`)
    #[arg(long = "set", value_name = "AXIS=VALUE")]
    set: Vec<String>,

    /// JSON file holding an array of conditions for batch evaluation
    #[arg(long, value_hint = ValueHint::FilePath)]
    conditions: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct CorrectArgs {
    /// Baseline distance from the flight-manual standard-condition table
    #[arg(short, long)]
    baseline: f64,

    /// Actual pressure altitude in feet
    #[arg(short, long)]
    altitude: f64,

    /// Actual outside air temperature in degrees C
    #[arg(short, long)]
    temperature: f64,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Performance model JSON path
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    model: PathBuf,

    /// Axis to group curves by (e.g. pressure_altitude)
    #[arg(long)]
    group_by: Option<String>,

    /// Axis each curve runs along (e.g. temperature)
    #[arg(long)]
    along: Option<String>,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Query(args) => args.verbose,
        Command::Correct(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Query(args) => handle_query(args),
        Command::Correct(args) => handle_correct(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn load_model(path: &PathBuf) -> Result<PerformanceModel> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let model: PerformanceModel =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    model
        .validate()
        .map_err(|e| anyhow!("model {} is invalid: {}", path.display(), e))?;
    debug!(
        "loaded model: {} axes, {} points, method {}",
        model.space.axes.len(),
        model.points().len(),
        model.method.name()
    );
    Ok(model)
}

fn parse_set(pairs: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut values = BTreeMap::new();
    for pair in pairs {
        let (axis, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected AXIS=VALUE, got {:?}", pair))?;
        let value: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid numeric value in {:?}", pair))?;
        values.insert(axis.trim().to_string(), value);
    }
    Ok(values)
}

fn handle_query(args: QueryArgs) -> Result<()> {
    let model = load_model(&args.model)?;

    if args.conditions.is_some() && !args.set.is_empty() {
        return Err(anyhow!("use either --set or --conditions, not both"));
    }

    if let Some(path) = args.conditions.as_ref() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let batch: Vec<BTreeMap<String, f64>> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if batch.is_empty() {
            return Err(anyhow!("--conditions file holds no conditions"));
        }

        let t_start = Instant::now();
        // Each condition is independent; evaluate across workers.
        let results: Vec<serde_json::Value> = batch
            .par_iter()
            .map(|values| {
                let condition = QueryCondition {
                    values: values.clone(),
                };
                match interpolate(&model, &condition, &args.output) {
                    Ok(result) => json!({ "condition": values, "result": result }),
                    Err(e) => json!({ "condition": values, "error": e.to_string() }),
                }
            })
            .collect();
        info!(
            "evaluated {} conditions in {:.1} ms",
            results.len(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if args.set.is_empty() {
        return Err(anyhow!("supply a condition via --set or --conditions"));
    }
    let condition = QueryCondition {
        values: parse_set(&args.set)?,
    };
    let result = interpolate(&model, &condition, &args.output)
        .map_err(|e| anyhow!("interpolation failed: {}", e))?;
    info!(
        "{} = {:.1} ({}% confidence, {} points, method {})",
        args.output,
        result.value,
        result.confidence,
        result.used_points.len(),
        result.method.name()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn handle_correct(args: CorrectArgs) -> Result<()> {
    let result = correct_distance(args.baseline, args.altitude, args.temperature)
        .map_err(|e| anyhow!("correction failed: {}", e))?;
    info!(
        "ISA {:.1} C, dT {:+.1} C, factor {:.3}",
        result.isa_temp, result.delta_t, result.correction_factor
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let model = load_model(&args.model)?;

    println!("method: {}", model.method.name());
    println!("axes:");
    for axis in &model.space.axes {
        println!(
            "  {} [{}]: {} .. {} (scale {})",
            axis.name, axis.unit, axis.min, axis.max, axis.normalization_scale
        );
    }
    println!("outputs: {}", model.space.outputs.join(", "));
    let manual = model.points().iter().filter(|p| p.is_manual).count();
    println!(
        "points: {} ({} manual, {} derived)",
        model.points().len(),
        manual,
        model.points().len() - manual
    );

    match (args.group_by.as_deref(), args.along.as_deref()) {
        (Some(group_axis), Some(along_axis)) => {
            let groups = group_by(&model, group_axis, along_axis)
                .map_err(|e| anyhow!("grouping failed: {}", e))?;
            println!("curves by {} (along {}):", group_axis, along_axis);
            for (value, sequence) in &groups {
                let lo = sequence.first().map(|p| p.values[along_axis]);
                let hi = sequence.last().map(|p| p.values[along_axis]);
                match (lo, hi) {
                    (Some(lo), Some(hi)) => println!(
                        "  {} = {}: {} points, {} {} .. {}",
                        group_axis,
                        value.into_inner(),
                        sequence.len(),
                        along_axis,
                        lo,
                        hi
                    ),
                    _ => println!("  {} = {}: empty", group_axis, value.into_inner()),
                }
            }
        }
        (None, None) => {}
        _ => return Err(anyhow!("--group-by and --along must be supplied together")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        let values = parse_set(&[
            "temperature=15".to_string(),
            "pressure_altitude = 2000".to_string(),
        ])
        .unwrap();
        assert_eq!(values["temperature"], 15.0);
        assert_eq!(values["pressure_altitude"], 2000.0);

        assert!(parse_set(&["temperature".to_string()]).is_err());
        assert!(parse_set(&["temperature=warm".to_string()]).is_err());
    }
}
