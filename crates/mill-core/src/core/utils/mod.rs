//! Static lookup tables shared by the codecs and workflows.

pub mod elements;
pub mod residues;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Unknown residue name: '{0}'")]
    UnknownResidue(String),
    #[error("Unknown residue code: '{0}'")]
    UnknownResidueCode(char),
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),
}
