use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid frame range {begin}..{end}: the end must lie after the beginning")]
    InvalidRange { begin: usize, end: usize },
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// An inclusive range of particle indices left out of a superposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionRange {
    pub first: usize,
    pub last: usize,
}

impl ExclusionRange {
    pub fn new(first: usize, last: usize) -> Result<Self, ConfigError> {
        if last < first {
            return Err(ConfigError::InvalidParameter {
                name: "exclude",
                reason: format!("range {}-{} is reversed", first, last),
            });
        }
        Ok(Self { first, last })
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }
}

/// A half-open range of frame indices, `begin..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractRange {
    pub begin: usize,
    pub end: usize,
}

impl ExtractRange {
    pub fn new(begin: usize, end: usize) -> Result<Self, ConfigError> {
        if end <= begin {
            return Err(ConfigError::InvalidRange { begin, end });
        }
        Ok(Self { begin, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub input: PathBuf,
    pub frames_per_file: usize,
}

impl SplitConfig {
    pub fn new(input: impl Into<PathBuf>, frames_per_file: usize) -> Result<Self, ConfigError> {
        if frames_per_file == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "frames_per_file",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            input: input.into(),
            frames_per_file,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImposeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub reference_frame: usize,
    pub exclude: Vec<ExclusionRange>,
}

impl ImposeConfig {
    /// Whether particle `index` takes part in the fit.
    pub fn is_fitted(&self, index: usize) -> bool {
        !self.exclude.iter().any(|range| range.contains(index))
    }
}

#[derive(Default)]
pub struct ImposeConfigBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    reference_frame: Option<usize>,
    exclude: Vec<ExclusionRange>,
}

impl ImposeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
    pub fn reference_frame(mut self, index: usize) -> Self {
        self.reference_frame = Some(index);
        self
    }
    pub fn exclude(mut self, range: ExclusionRange) -> Self {
        self.exclude.push(range);
        self
    }
    pub fn exclude_all(mut self, ranges: impl IntoIterator<Item = ExclusionRange>) -> Self {
        self.exclude.extend(ranges);
        self
    }

    pub fn build(self) -> Result<ImposeConfig, ConfigError> {
        Ok(ImposeConfig {
            input: self.input.ok_or(ConfigError::MissingParameter("input"))?,
            output: self.output.ok_or(ConfigError::MissingParameter("output"))?,
            reference_frame: self.reference_frame.unwrap_or(0),
            exclude: self.exclude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impose_builder_requires_input_and_output() {
        let err = ImposeConfigBuilder::new().output("out.dcd").build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("input"));
        let err = ImposeConfigBuilder::new().input("in.dcd").build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("output"));
    }

    #[test]
    fn impose_builder_defaults_to_first_frame() {
        let config = ImposeConfigBuilder::new()
            .input("in.dcd")
            .output("out.dcd")
            .exclude(ExclusionRange::new(0, 2).unwrap())
            .build()
            .unwrap();
        assert_eq!(config.reference_frame, 0);
        assert!(!config.is_fitted(0));
        assert!(!config.is_fitted(2));
        assert!(config.is_fitted(3));
    }

    #[test]
    fn ranges_are_validated() {
        assert!(ExclusionRange::new(5, 5).is_ok());
        assert!(ExclusionRange::new(6, 5).is_err());
        assert_eq!(
            ExtractRange::new(4, 4),
            Err(ConfigError::InvalidRange { begin: 4, end: 4 })
        );
        assert_eq!(ExtractRange::new(2, 7).unwrap().len(), 5);
        assert!(SplitConfig::new("traj.dcd", 0).is_err());
    }
}
