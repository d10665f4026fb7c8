use super::LookupError;
use phf::{Map, phf_map};

/// Standard atomic weights (g/mol) of the elements found in biomolecular systems.
#[rustfmt::skip]
static ELEMENT_MASSES: Map<&'static str, f64> = phf_map! {
    "H" => 1.008, "D" => 2.014, "C" => 12.011, "N" => 14.007, "O" => 15.999,
    "F" => 18.998, "NA" => 22.990, "MG" => 24.305, "P" => 30.974, "S" => 32.06,
    "CL" => 35.45, "K" => 39.098, "CA" => 40.078, "MN" => 54.938, "FE" => 55.845,
    "CO" => 58.933, "NI" => 58.693, "CU" => 63.546, "ZN" => 65.38, "SE" => 78.971,
    "BR" => 79.904, "I" => 126.904,
};

pub fn element_mass(symbol: &str) -> Result<f64, LookupError> {
    let key = symbol.trim().to_ascii_uppercase();
    ELEMENT_MASSES
        .get(key.as_str())
        .copied()
        .ok_or(LookupError::UnknownElement(key))
}

pub fn is_known_element(symbol: &str) -> bool {
    ELEMENT_MASSES.contains_key(symbol.trim().to_ascii_uppercase().as_str())
}

/// Best-effort element symbol from a PDB atom name: leading digits are
/// skipped and the first letter is used, e.g. `" CA "` → `"C"`, `"1HB"` → `"H"`.
pub fn element_from_atom_name(atom_name: &str) -> Option<String> {
    atom_name
        .trim()
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .filter(|symbol| is_known_element(symbol))
}
