use crate::errors::{DatasusError, DatasusResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Representation of a Brazilian Federative Unit (State).
///
/// # Fields
/// * `code` - IBGE code of the state (0 for the whole country)
/// * `name` - Full name of the state
/// * `uf` - State abbreviation (2 letters)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateBR {
    pub code: u8,
    pub name: &'static str,
    pub uf: &'static str,
}

impl StateBR {
    pub const fn new(code: u8, name: &'static str, uf: &'static str) -> Self {
        Self { code, name, uf }
    }
}

/// Abbreviation used by national (country-wide) files
pub const BRAZIL_UF: &str = "BR";

const STATES: &[StateBR] = &[
    StateBR::new(0, "Brasil", "BR"),
    StateBR::new(11, "Rondônia", "RO"),
    StateBR::new(12, "Acre", "AC"),
    StateBR::new(13, "Amazonas", "AM"),
    StateBR::new(14, "Roraima", "RR"),
    StateBR::new(15, "Pará", "PA"),
    StateBR::new(16, "Amapá", "AP"),
    StateBR::new(17, "Tocantins", "TO"),
    StateBR::new(21, "Maranhão", "MA"),
    StateBR::new(22, "Piauí", "PI"),
    StateBR::new(23, "Ceará", "CE"),
    StateBR::new(24, "Rio Grande do Norte", "RN"),
    StateBR::new(25, "Paraíba", "PB"),
    StateBR::new(26, "Pernambuco", "PE"),
    StateBR::new(27, "Alagoas", "AL"),
    StateBR::new(28, "Sergipe", "SE"),
    StateBR::new(29, "Bahia", "BA"),
    StateBR::new(31, "Minas Gerais", "MG"),
    StateBR::new(32, "Espírito Santo", "ES"),
    StateBR::new(33, "Rio de Janeiro", "RJ"),
    StateBR::new(35, "São Paulo", "SP"),
    StateBR::new(41, "Paraná", "PR"),
    StateBR::new(42, "Santa Catarina", "SC"),
    StateBR::new(43, "Rio Grande do Sul", "RS"),
    StateBR::new(50, "Mato Grosso do Sul", "MS"),
    StateBR::new(51, "Mato Grosso", "MT"),
    StateBR::new(52, "Goiás", "GO"),
    StateBR::new(53, "Distrito Federal", "DF"),
];

/// Mapping of UF abbreviations (plus `BR`) to their state data
pub static UFS: Lazy<HashMap<&'static str, StateBR>> =
    Lazy::new(|| STATES.iter().map(|state| (state.uf, *state)).collect());

/// Full state name for an abbreviation (case insensitive)
pub fn uf_name(uf: &str) -> Option<&'static str> {
    UFS.get(uf.to_uppercase().as_str()).map(|state| state.name)
}

/// Uppercases and validates a UF filter.
///
/// Every unknown abbreviation is reported at once, sorted.
///
/// # Example
/// ```rust
/// use datasus::models::geo_utils::parse_ufs;
///
/// assert_eq!(parse_ufs(&["sp", "RJ"]).unwrap(), vec!["SP", "RJ"]);
/// assert!(parse_ufs(&["XX"]).is_err());
/// ```
pub fn parse_ufs<S: AsRef<str>>(ufs: &[S]) -> DatasusResult<Vec<String>> {
    parse_ufs_with(ufs, &[])
}

/// Like [`parse_ufs`], also accepting adapter-specific extra codes
pub fn parse_ufs_with<S: AsRef<str>>(ufs: &[S], extra: &[&str]) -> DatasusResult<Vec<String>> {
    let upper: Vec<String> = ufs.iter().map(|uf| uf.as_ref().trim().to_uppercase()).collect();
    let invalid: Vec<&String> = upper
        .iter()
        .filter(|uf| !UFS.contains_key(uf.as_str()) && !extra.contains(&uf.as_str()))
        .collect();
    if !invalid.is_empty() {
        return Err(DatasusError::validation(
            "uf",
            invalid.into_iter().cloned(),
        ));
    }
    Ok(upper)
}
