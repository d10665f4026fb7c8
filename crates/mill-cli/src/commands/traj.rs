use crate::cli::{
    ConvertArgs, ExtractArgs, ImposeArgs, JoinArgs, MeanArgs, ProjectionArgs, RotateArgs,
    RunningAverageArgs, SplitArgs, TrajArgs, TrajCommands, TranslateArgs,
};
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mill::core::math::geometry::Vector3;
use mill::workflows::config::{ExtractRange, SplitConfig};
use mill::workflows::progress::ProgressReporter;
use mill::workflows::transform::Translation;
use mill::workflows::{
    average, convert, extract, impose, join, projection, sibling_path, split, transform,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(args: TrajArgs) -> Result<()> {
    let progress = CliProgressHandler::new();
    let reporter = progress.reporter();

    match args.command {
        TrajCommands::Convert(args) => run_convert(args, &reporter),
        TrajCommands::Extract(args) => run_extract(args, &reporter),
        TrajCommands::Join(args) => run_join(args, &reporter),
        TrajCommands::Split(args) => run_split(args, &reporter),
        TrajCommands::Impose(args) => run_impose(args, &reporter),
        TrajCommands::Translate(args) => run_translate(args, &reporter),
        TrajCommands::Rotate(args) => run_rotate(args, &reporter),
        TrajCommands::RunningAverage(args) => run_running_average(args, &reporter),
        TrajCommands::Mean(args) => run_mean(args, &reporter),
        TrajCommands::Projection(args) => run_projection(args, &reporter),
    }
}

fn run_convert(args: ConvertArgs, reporter: &ProgressReporter) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| convert::converted_path(&args.input, args.format));
    let frames = convert::convert(
        &args.input,
        &output,
        args.format,
        args.reference.as_deref(),
        reporter,
    )?;
    println!("Wrote {} frames to {}", frames, output.display());
    Ok(())
}

fn run_extract(args: ExtractArgs, reporter: &ProgressReporter) -> Result<()> {
    let range = ExtractRange::new(args.begin, args.end)?;
    let output = args
        .output
        .unwrap_or_else(|| extract::extracted_path(&args.input, range));
    let frames = extract::run(&args.input, range, &output, reporter)?;
    println!("Wrote {} frames to {}", frames, output.display());
    Ok(())
}

fn run_join(args: JoinArgs, reporter: &ProgressReporter) -> Result<()> {
    let frames = join::run(&args.output, &args.inputs, reporter)?;
    println!(
        "Joined {} files ({} frames) into {}",
        args.inputs.len(),
        frames,
        args.output.display()
    );
    Ok(())
}

fn run_split(args: SplitArgs, reporter: &ProgressReporter) -> Result<()> {
    let config = SplitConfig::new(&args.input, args.frames_per_file)?;
    let outputs = split::run(&config, reporter)?;
    for path in &outputs {
        println!("  {}", path.display());
    }
    println!("Split {} into {} files", args.input.display(), outputs.len());
    Ok(())
}

fn run_impose(args: ImposeArgs, reporter: &ProgressReporter) -> Result<()> {
    let config = config::impose_config(&args)?;
    info!(
        input = %config.input.display(),
        reference_frame = config.reference_frame,
        excluded_ranges = config.exclude.len(),
        "Resolved impose configuration."
    );
    let summary = impose::run(&config, reporter)?;
    println!(
        "Imposed {} frames onto frame {} (max RMSD before fit {:.4}); wrote {}",
        summary.frames,
        config.reference_frame,
        summary.max_rmsd,
        config.output.display()
    );
    Ok(())
}

fn output_or(output: Option<PathBuf>, input: &Path, suffix: &str) -> PathBuf {
    output.unwrap_or_else(|| sibling_path(input, suffix))
}

fn run_translate(args: TranslateArgs, reporter: &ProgressReporter) -> Result<()> {
    let translation = if args.center_of_mass {
        Translation::CenterOfMass
    } else {
        match args.offset.as_slice() {
            &[dx, dy, dz] => Translation::By(Vector3::new(dx, dy, dz)),
            other => {
                return Err(CliError::Argument(format!(
                    "expected three translation components, got {}",
                    other.len()
                )));
            }
        }
    };
    let output = output_or(args.output, &args.input, "_translated");
    let frames = transform::translate(&args.input, &output, translation, reporter)?;
    println!("Wrote {} frames to {}", frames, output.display());
    Ok(())
}

fn run_rotate(args: RotateArgs, reporter: &ProgressReporter) -> Result<()> {
    let output = output_or(args.output, &args.input, "_rotated");
    let frames = transform::rotate(&args.input, &output, &args.axis, args.degrees, reporter)?;
    println!("Wrote {} frames to {}", frames, output.display());
    Ok(())
}

fn run_running_average(args: RunningAverageArgs, reporter: &ProgressReporter) -> Result<()> {
    let output = output_or(args.output, &args.input, "_running");
    let frames = average::running_average(&args.input, &output, args.window, reporter)?;
    println!("Wrote {} averaged frames to {}", frames, output.display());
    Ok(())
}

fn run_mean(args: MeanArgs, reporter: &ProgressReporter) -> Result<()> {
    let output = output_or(args.output, &args.input, "_mean");
    let structure = average::mean(&args.input, &output, args.superpose, reporter)?;
    println!(
        "Wrote mean structure of {} particles to {}",
        structure.len(),
        output.display()
    );
    Ok(())
}

fn run_projection(args: ProjectionArgs, reporter: &ProgressReporter) -> Result<()> {
    let values = projection::run(
        &args.input,
        &args.mode_file,
        args.output.as_deref(),
        reporter,
    )?;
    match &args.output {
        Some(table) => println!("Wrote {} projections to {}", values.len(), table.display()),
        None => {
            println!("frame,projection");
            for (frame, value) in values.iter().enumerate() {
                println!("{},{:.6}", frame, value);
            }
        }
    }
    Ok(())
}
