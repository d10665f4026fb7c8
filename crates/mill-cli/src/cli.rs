use crate::utils::parser::{parse_axis, parse_exclusion};
use clap::{Args, Parser, Subcommand};
use mill::core::io::format::TrajectoryFormat;
use mill::core::math::geometry::Vector3;
use mill::workflows::config::ExclusionRange;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "mill - a toolkit for converting, slicing and superposing molecular dynamics trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Operate on trajectory files (DCD, PDB, CG-PDB, XYZ, TRR).
    Traj(TrajArgs),
}

#[derive(Args, Debug)]
pub struct TrajArgs {
    #[command(subcommand)]
    pub command: TrajCommands,
}

#[derive(Subcommand, Debug)]
pub enum TrajCommands {
    /// Convert a trajectory into another format.
    Convert(ConvertArgs),
    /// Copy a half-open range of frames into a new file.
    Extract(ExtractArgs),
    /// Concatenate trajectories with the same particle count.
    Join(JoinArgs),
    /// Cut a trajectory into files of a fixed number of frames.
    Split(SplitArgs),
    /// Superpose every frame onto a reference frame.
    Impose(ImposeArgs),
    /// Translate every frame by a fixed vector or onto its center of mass.
    Translate(TranslateArgs),
    /// Rotate every frame about an axis through the origin.
    Rotate(RotateArgs),
    /// Smooth a trajectory with a sliding-window average.
    #[command(name = "running-average", alias = "running_average")]
    RunningAverage(RunningAverageArgs),
    /// Write the average structure of a trajectory.
    Mean(MeanArgs),
    /// Project each frame's displacement from the mean onto a mode vector.
    Projection(ProjectionArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input trajectory; the format follows the file extension.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Target format: dcd, pdb, cgpdb, xyz or trr.
    #[arg(value_name = "FORMAT")]
    pub format: TrajectoryFormat,

    /// Structure file whose per-particle metadata (names, residues, elements)
    /// is merged into every converted frame.
    #[arg(value_name = "REFERENCE")]
    pub reference: Option<PathBuf>,

    /// Output path. Defaults to `<INPUT>_converted.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// First frame to copy (0-based).
    #[arg(value_name = "BEGIN")]
    pub begin: usize,

    /// Frame after the last one to copy.
    #[arg(value_name = "END")]
    pub end: usize,

    /// Output path. Defaults to `<INPUT>_<BEGIN>-<END>.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Output trajectory; the format follows the file extension.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Trajectories to concatenate, in order.
    #[arg(value_name = "INPUT", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of frames per output file; outputs are named `<stem>_<k>.<ext>`.
    #[arg(value_name = "FRAMES")]
    pub frames_per_file: usize,
}

#[derive(Args, Debug)]
pub struct ImposeArgs {
    /// Input trajectory, or a TOML job file with an `[impose]` table.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path. Defaults to `<stem>_imposed.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Index of the frame to superpose onto (0-based).
    #[arg(short, long, value_name = "INT")]
    pub reference_frame: Option<usize>,

    /// Inclusive particle index range left out of the fit, e.g. `0-9`.
    /// Can be used multiple times.
    #[arg(short, long, value_name = "A-B", value_parser = parse_exclusion)]
    pub exclude: Vec<ExclusionRange>,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Translation vector.
    #[arg(
        value_names = ["DX", "DY", "DZ"],
        num_args = 3,
        allow_negative_numbers = true,
        required_unless_present = "center_of_mass",
        conflicts_with = "center_of_mass"
    )]
    pub offset: Vec<f64>,

    /// Move each frame's mass-weighted center to the origin instead.
    #[arg(long)]
    pub center_of_mass: bool,

    /// Output path. Defaults to `<stem>_translated.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RotateArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Rotation axis: `x`, `y`, `z` or a vector `vx,vy,vz`.
    #[arg(value_name = "AXIS", value_parser = parse_axis, allow_hyphen_values = true)]
    pub axis: Vector3,

    /// Rotation angle in degrees.
    #[arg(value_name = "DEGREES", allow_negative_numbers = true)]
    pub degrees: f64,

    /// Output path. Defaults to `<stem>_rotated.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunningAverageArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of consecutive frames averaged into each output frame.
    #[arg(value_name = "WINDOW")]
    pub window: usize,

    /// Output path. Defaults to `<stem>_running.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MeanArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Superpose every frame onto the first before averaging.
    #[arg(long)]
    pub superpose: bool,

    /// Output path. Defaults to `<stem>_mean.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProjectionArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Any supported trajectory file; its first frame holds one mode vector
    /// per particle.
    #[arg(value_name = "MODE")]
    pub mode_file: PathBuf,

    /// Write the projections as a CSV table.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn traj(args: &[&str]) -> TrajCommands {
        let argv = ["mill", "traj"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Traj(traj) => traj.command,
        }
    }

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn convert_parses_format_names_case_insensitively() {
        match traj(&["convert", "input.dcd", "XYZ", "input.pdb"]) {
            TrajCommands::Convert(args) => {
                assert_eq!(args.format, TrajectoryFormat::Xyz);
                assert_eq!(args.reference, Some(PathBuf::from("input.pdb")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_format_name_is_rejected() {
        let result = Cli::try_parse_from(["mill", "traj", "convert", "a.dcd", "mol2"]);
        assert!(result.is_err());
    }

    #[test]
    fn impose_collects_repeated_exclusions() {
        match traj(&["impose", "t.dcd", "-e", "0-9", "--exclude", "120-135", "-r", "2"]) {
            TrajCommands::Impose(args) => {
                assert_eq!(args.reference_frame, Some(2));
                assert_eq!(
                    args.exclude,
                    vec![
                        ExclusionRange::new(0, 9).unwrap(),
                        ExclusionRange::new(120, 135).unwrap()
                    ]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn translate_takes_a_vector_or_center_of_mass() {
        match traj(&["translate", "t.xyz", "1.5", "-2", "0"]) {
            TrajCommands::Translate(args) => assert_eq!(args.offset, vec![1.5, -2.0, 0.0]),
            other => panic!("unexpected command: {other:?}"),
        }
        match traj(&["translate", "t.xyz", "--center-of-mass"]) {
            TrajCommands::Translate(args) => {
                assert!(args.center_of_mass);
                assert!(args.offset.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["mill", "traj", "translate", "t.xyz"]).is_err());
    }

    #[test]
    fn rotate_accepts_named_and_explicit_axes() {
        match traj(&["rotate", "t.dcd", "z", "-90"]) {
            TrajCommands::Rotate(args) => {
                assert_eq!(args.axis, Vector3::z());
                assert_eq!(args.degrees, -90.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        match traj(&["rotate", "t.dcd", "1,-1,0", "45"]) {
            TrajCommands::Rotate(args) => assert_eq!(args.axis, Vector3::new(1.0, -1.0, 0.0)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn running_average_accepts_both_spellings() {
        for name in ["running-average", "running_average"] {
            assert!(matches!(
                traj(&[name, "t.dcd", "5"]),
                TrajCommands::RunningAverage(RunningAverageArgs { window: 5, .. })
            ));
        }
    }
}
