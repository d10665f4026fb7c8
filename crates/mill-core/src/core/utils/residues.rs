use super::LookupError;
use phf::{Map, phf_map};

#[rustfmt::skip]
static THREE_TO_ONE: Map<&'static str, char> = phf_map! {
    // --- Standard amino acids ---
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',

    // --- Protonation / force-field variants ---
    "HID" => 'H', "HIE" => 'H', "HIP" => 'H', "HSD" => 'H', "HSE" => 'H', "HSP" => 'H',
    "CYX" => 'C', "ASH" => 'D', "GLH" => 'E', "LYN" => 'K',

    // --- DNA bases ---
    "DA" => 'A', "DT" => 'T', "DG" => 'G', "DC" => 'C',
    "ADE" => 'A', "THY" => 'T', "GUA" => 'G', "CYT" => 'C',
};

#[rustfmt::skip]
static ONE_TO_THREE_PROTEIN: Map<char, &'static str> = phf_map! {
    'A' => "ALA", 'R' => "ARG", 'N' => "ASN", 'D' => "ASP", 'C' => "CYS",
    'Q' => "GLN", 'E' => "GLU", 'G' => "GLY", 'H' => "HIS", 'I' => "ILE",
    'L' => "LEU", 'K' => "LYS", 'M' => "MET", 'F' => "PHE", 'P' => "PRO",
    'S' => "SER", 'T' => "THR", 'W' => "TRP", 'Y' => "TYR", 'V' => "VAL",
};

#[rustfmt::skip]
static ONE_TO_THREE_DNA: Map<char, &'static str> = phf_map! {
    'A' => "DA", 'T' => "DT", 'G' => "DG", 'C' => "DC",
};

/// One-letter protein or DNA base code of a residue name.
pub fn residue_code(residue_name: &str) -> Result<char, LookupError> {
    let key = residue_name.trim();
    THREE_TO_ONE
        .get(key)
        .copied()
        .ok_or_else(|| LookupError::UnknownResidue(key.to_string()))
}

pub fn protein_residue_name(code: char) -> Result<&'static str, LookupError> {
    ONE_TO_THREE_PROTEIN
        .get(&code.to_ascii_uppercase())
        .copied()
        .ok_or(LookupError::UnknownResidueCode(code))
}

pub fn dna_residue_name(code: char) -> Result<&'static str, LookupError> {
    ONE_TO_THREE_DNA
        .get(&code.to_ascii_uppercase())
        .copied()
        .ok_or(LookupError::UnknownResidueCode(code))
}

pub fn is_dna_residue(residue_name: &str) -> bool {
    matches!(
        residue_name.trim(),
        "DA" | "DT" | "DG" | "DC" | "ADE" | "THY" | "GUA" | "CYT"
    )
}
