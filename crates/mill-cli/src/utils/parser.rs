use mill::core::math::geometry::Vector3;
use mill::workflows::config::ExclusionRange;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid axis '{0}'. Expected 'x', 'y', 'z' or a vector 'vx,vy,vz' (e.g., '1,1,0').")]
    InvalidAxis(String),

    #[error("Axis '{0}' has zero length.")]
    ZeroAxis(String),

    #[error("Invalid particle range '{0}'. Expected 'A-B' or a single index (e.g., '0-9').")]
    InvalidRange(String),

    #[error("Particle range '{0}' is reversed.")]
    ReversedRange(String),
}

pub fn parse_axis(s: &str) -> Result<Vector3, ParseError> {
    let axis = match s.trim().to_ascii_lowercase().as_str() {
        "x" => Vector3::x(),
        "y" => Vector3::y(),
        "z" => Vector3::z(),
        other => {
            let components = other
                .split(',')
                .map(|c| c.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ParseError::InvalidAxis(s.to_string()))?;
            match components.as_slice() {
                &[x, y, z] => Vector3::new(x, y, z),
                _ => return Err(ParseError::InvalidAxis(s.to_string())),
            }
        }
    };
    if axis.norm() == 0.0 {
        return Err(ParseError::ZeroAxis(s.to_string()));
    }
    Ok(axis)
}

pub fn parse_exclusion(s: &str) -> Result<ExclusionRange, ParseError> {
    let invalid = || ParseError::InvalidRange(s.to_string());
    let parse_index = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());
    let (first, last) = match s.split_once('-') {
        Some((first, last)) => (parse_index(first)?, parse_index(last)?),
        None => {
            let index = parse_index(s)?;
            (index, index)
        }
    };
    ExclusionRange::new(first, last).map_err(|_| ParseError::ReversedRange(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_axis_handles_names_and_vectors() {
        assert_eq!(parse_axis("X"), Ok(Vector3::x()));
        assert_eq!(parse_axis(" z "), Ok(Vector3::z()));
        assert_eq!(parse_axis("1, 2,-3"), Ok(Vector3::new(1.0, 2.0, -3.0)));
    }

    #[test]
    fn parse_axis_rejects_malformed_input() {
        assert_eq!(parse_axis("w"), Err(ParseError::InvalidAxis("w".to_string())));
        assert_eq!(parse_axis("1,2"), Err(ParseError::InvalidAxis("1,2".to_string())));
        assert_eq!(parse_axis("0,0,0"), Err(ParseError::ZeroAxis("0,0,0".to_string())));
    }

    #[test]
    fn parse_exclusion_accepts_ranges_and_single_indices() {
        assert_eq!(parse_exclusion("3-7"), Ok(ExclusionRange::new(3, 7).unwrap()));
        assert_eq!(parse_exclusion("12"), Ok(ExclusionRange::new(12, 12).unwrap()));
    }

    #[test]
    fn parse_exclusion_rejects_bad_ranges() {
        assert_eq!(parse_exclusion("a-b"), Err(ParseError::InvalidRange("a-b".to_string())));
        assert_eq!(parse_exclusion("9-3"), Err(ParseError::ReversedRange("9-3".to_string())));
        assert!(parse_exclusion("-4").is_err());
    }
}
