use crate::cli::ImposeArgs;
use crate::error::{CliError, Result};
use mill::workflows::config::{ExclusionRange, ImposeConfig, ImposeConfigBuilder};
use mill::workflows::sibling_path;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A TOML job file. Only the `[impose]` table is recognized.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub impose: Option<PartialImposeConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialImposeConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub reference_frame: Option<usize>,
    /// Inclusive `[first, last]` particle index pairs.
    #[serde(default)]
    pub exclude: Vec<[usize; 2]>,
}

impl JobFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading job file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut job: JobFile = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if let (Some(impose), Some(dir)) = (job.impose.as_mut(), path.parent()) {
            impose.resolve_relative_to(dir);
        }
        Ok(job)
    }
}

impl PartialImposeConfig {
    fn resolve_relative_to(&mut self, dir: &Path) {
        for path in [&mut self.input, &mut self.output].into_iter().flatten() {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    /// Combines file values with command-line flags; flags win, and the output
    /// defaults to `<stem>_imposed.<ext>` next to the input.
    pub fn merge_with_cli(self, args: &ImposeArgs) -> Result<ImposeConfig> {
        let input = self
            .input
            .ok_or_else(|| CliError::Config("the [impose] table needs an `input`".to_string()))?;
        let output = args
            .output
            .clone()
            .or(self.output)
            .unwrap_or_else(|| sibling_path(&input, "_imposed"));
        let exclude = if args.exclude.is_empty() {
            self.exclude
                .into_iter()
                .map(|[first, last]| ExclusionRange::new(first, last))
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            args.exclude.clone()
        };

        let mut builder = ImposeConfigBuilder::new()
            .input(input)
            .output(output)
            .exclude_all(exclude);
        if let Some(frame) = args.reference_frame.or(self.reference_frame) {
            builder = builder.reference_frame(frame);
        }
        Ok(builder.build()?)
    }
}

fn is_job_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Builds the impose configuration from the command line, reading a job file
/// first when `INPUT` names one.
pub fn impose_config(args: &ImposeArgs) -> Result<ImposeConfig> {
    let partial = if is_job_file(&args.input) {
        JobFile::from_file(&args.input)?
            .impose
            .ok_or_else(|| {
                CliError::Config(format!(
                    "job file '{}' has no [impose] table",
                    args.input.display()
                ))
            })?
    } else {
        PartialImposeConfig {
            input: Some(args.input.clone()),
            ..Default::default()
        }
    };
    partial.merge_with_cli(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands, TrajCommands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn impose_args(argv: &[&str]) -> ImposeArgs {
        let full = ["mill", "traj", "impose"].iter().chain(argv).copied();
        match Cli::parse_from(full).command {
            Commands::Traj(traj) => match traj.command {
                TrajCommands::Impose(args) => args,
                other => panic!("unexpected command: {other:?}"),
            },
        }
    }

    #[test]
    fn plain_trajectory_input_uses_defaults() {
        let args = impose_args(&["runs/traj.dcd"]);
        let config = impose_config(&args).unwrap();
        assert_eq!(config.input, PathBuf::from("runs/traj.dcd"));
        assert_eq!(config.output, PathBuf::from("runs/traj_imposed.dcd"));
        assert_eq!(config.reference_frame, 0);
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn job_file_values_are_loaded_relative_to_the_file() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job.toml");
        fs::write(
            &job,
            r#"
            [impose]
            input = "traj.dcd"
            output = "fitted.dcd"
            reference-frame = 3
            exclude = [[0, 9], [120, 135]]
            "#,
        )
        .unwrap();

        let args = impose_args(&[job.to_str().unwrap()]);
        let config = impose_config(&args).unwrap();
        assert_eq!(config.input, dir.path().join("traj.dcd"));
        assert_eq!(config.output, dir.path().join("fitted.dcd"));
        assert_eq!(config.reference_frame, 3);
        assert_eq!(
            config.exclude,
            vec![
                ExclusionRange::new(0, 9).unwrap(),
                ExclusionRange::new(120, 135).unwrap()
            ]
        );
    }

    #[test]
    fn cli_flags_override_job_file_values() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job.toml");
        fs::write(
            &job,
            "[impose]\ninput = \"traj.dcd\"\nreference-frame = 3\nexclude = [[0, 9]]\n",
        )
        .unwrap();

        let job = job.to_str().unwrap();
        let args = impose_args(&[job, "-r", "1", "-e", "5-6", "-o", "out.dcd"]);
        let config = impose_config(&args).unwrap();
        assert_eq!(config.reference_frame, 1);
        assert_eq!(config.output, PathBuf::from("out.dcd"));
        assert_eq!(config.exclude, vec![ExclusionRange::new(5, 6).unwrap()]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job.toml");
        fs::write(&job, "[impose]\ninput = \"traj.dcd\"\nreference = 2\n").unwrap();

        let err = JobFile::from_file(&job).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn job_file_without_input_is_a_config_error() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job.toml");
        fs::write(&job, "[impose]\nreference-frame = 2\n").unwrap();

        let args = impose_args(&[job.to_str().unwrap()]);
        assert!(matches!(impose_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn reversed_exclusion_in_job_file_is_rejected() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job.toml");
        fs::write(&job, "[impose]\ninput = \"t.dcd\"\nexclude = [[9, 0]]\n").unwrap();

        let args = impose_args(&[job.to_str().unwrap()]);
        assert!(matches!(impose_config(&args), Err(CliError::Workflow(_))));
    }
}
