use crate::models::date_utils::year_from_digits;
use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("file name grammar must compile")
}

/// `DO{UF}{YYYY}`
pub static SIM_CID10_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^(DO)([A-Z]{2})(\d{4})$"));
/// `DOR{UF}{YY}`
pub static SIM_CID9_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^(DOR)([A-Z]{2})(\d{2})$"));
/// `DN{UF}{YYYY}`, `UF` may be `EX`
pub static SINASC_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^(DN)([A-Z]{2})(\d{4})$"));
/// `DNR{UF}{YY}`
pub static SINASC_OLD_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^(DNR)([A-Z]{2})(\d{2})$"));
/// `{group:2}{UF}{YY}{MM}`, shared by SIH and CNES
pub static MONTHLY_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"^([A-Z]{2})([A-Z]{2})(\d{2})(\d{2})$"));
/// `{group:2-5}{UF}{YY}{MM}` plus the split suffix of large states (`PASP2301a`)
pub static SIA_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"^([A-Z]{2,5})([A-Z]{2})(\d{2})(\d{2})([A-Za-z])?$"));
pub static CIHA_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"^(CIHA)([A-Z]{2})(\d{2})(\d{2})$"));
/// `{group:4}{UF}{YY}`
pub static PNI_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^([A-Z]{4})([A-Z]{2})(\d{2})$"));
/// `{disease:3-4}BR{YY}`
pub static SINAN_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^([A-Z]{3,4})BR(\d{2})$"));
/// Anything ending in a two-digit year
pub static YEAR_SUFFIX_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"^.*?(\d{2})$"));

/// Components parsed out of a file stem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    /// Group or disease code, as stored
    pub prefix: String,
    pub uf: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub part: Option<char>,
}

/// File-name grammars of the DATASUS databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileNameGrammar {
    SimCid10,
    SimCid9,
    Sinasc,
    SinascOld,
    Monthly,
    Sia,
    Ciha,
    Pni,
    Sinan,
    YearSuffix,
}

impl FileNameGrammar {
    pub fn regex(self) -> &'static Regex {
        match self {
            Self::SimCid10 => &SIM_CID10_PATTERN,
            Self::SimCid9 => &SIM_CID9_PATTERN,
            Self::Sinasc => &SINASC_PATTERN,
            Self::SinascOld => &SINASC_OLD_PATTERN,
            Self::Monthly => &MONTHLY_PATTERN,
            Self::Sia => &SIA_PATTERN,
            Self::Ciha => &CIHA_PATTERN,
            Self::Pni => &PNI_PATTERN,
            Self::Sinan => &SINAN_PATTERN,
            Self::YearSuffix => &YEAR_SUFFIX_PATTERN,
        }
    }

    /// Parses a file stem (the name without extension).
    ///
    /// Letters are matched upper-cased, except for the SIA split suffix
    /// which keeps its case. Month digits outside `01..=12` do not match.
    pub fn parse(self, stem: &str) -> Option<NameParts> {
        let upper = stem.to_uppercase();
        let subject = match self {
            // the suffix is lowercase on the server
            Self::Sia if self.regex().is_match(stem) => stem,
            _ => upper.as_str(),
        };
        let caps = self.regex().captures(subject)?;
        let text = |i: usize| caps.get(i).map(|m| m.as_str());

        let parts = match self {
            Self::SimCid10 | Self::SimCid9 | Self::Sinasc | Self::SinascOld | Self::Pni => NameParts {
                prefix: text(1)?.to_string(),
                uf: text(2).map(str::to_string),
                year: Some(year_from_digits(text(3)?)?),
                ..NameParts::default()
            },
            Self::Monthly | Self::Sia | Self::Ciha => NameParts {
                prefix: text(1)?.to_string(),
                uf: text(2).map(str::to_string),
                year: Some(year_from_digits(text(3)?)?),
                month: Some(parse_month(text(4)?)?),
                part: text(5).and_then(|s| s.chars().next()),
            },
            Self::Sinan => NameParts {
                prefix: text(1)?.to_string(),
                year: Some(year_from_digits(text(2)?)?),
                ..NameParts::default()
            },
            Self::YearSuffix => NameParts {
                prefix: upper.trim_end_matches(|c: char| c.is_ascii_digit()).to_string(),
                year: Some(year_from_digits(text(1)?)?),
                ..NameParts::default()
            },
        };
        Some(parts)
    }
}

fn parse_month(digits: &str) -> Option<u32> {
    digits.parse().ok().filter(|m| (1..=12).contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_grammar() {
        let parts = FileNameGrammar::Monthly.parse("RDAC2301").unwrap();
        assert_eq!(parts.prefix, "RD");
        assert_eq!(parts.uf.as_deref(), Some("AC"));
        assert_eq!(parts.year, Some(2023));
        assert_eq!(parts.month, Some(1));

        assert!(FileNameGrammar::Monthly.parse("RDAC2313").is_none());
        assert!(FileNameGrammar::Monthly.parse("RDAC2300").is_none());
        assert!(FileNameGrammar::Monthly.parse("GMufAAmm").is_none());
        assert!(FileNameGrammar::Monthly.parse("RD_AC2301").is_none());
    }

    #[test]
    fn test_sia_group_lengths_and_suffix() {
        let pa = FileNameGrammar::Sia.parse("PASP2301a").unwrap();
        assert_eq!(pa.prefix, "PA");
        assert_eq!(pa.uf.as_deref(), Some("SP"));
        assert_eq!(pa.part, Some('a'));

        let impbo = FileNameGrammar::Sia.parse("IMPBOMG1912").unwrap();
        assert_eq!(impbo.prefix, "IMPBO");
        assert_eq!(impbo.uf.as_deref(), Some("MG"));
        assert_eq!(impbo.part, None);
    }

    #[test]
    fn test_sim_and_sinasc_grammars() {
        let cid10 = FileNameGrammar::SimCid10.parse("DOAC1996").unwrap();
        assert_eq!((cid10.prefix.as_str(), cid10.year), ("DO", Some(1996)));
        let cid9 = FileNameGrammar::SimCid9.parse("DORAC95").unwrap();
        assert_eq!(cid9.year, Some(1995));
        assert!(FileNameGrammar::SimCid10.parse("DORAC95").is_none());

        let ex = FileNameGrammar::Sinasc.parse("DNEX2021").unwrap();
        assert_eq!(ex.uf.as_deref(), Some("EX"));
        assert_eq!(FileNameGrammar::SinascOld.parse("DNRSP96").unwrap().year, Some(1996));
    }

    #[test]
    fn test_sinan_grammar() {
        let deng = FileNameGrammar::Sinan.parse("DENGBR19").unwrap();
        assert_eq!(deng.prefix, "DENG");
        assert_eq!(deng.year, Some(2019));
        assert_eq!(FileNameGrammar::Sinan.parse("SRCBR08").unwrap().prefix, "SRC");
        assert_eq!(FileNameGrammar::Sinan.parse("LEIBR22").unwrap().prefix, "LEI");
        assert!(FileNameGrammar::Sinan.parse("DENGSP19").is_none());
    }

    #[test]
    fn test_year_suffix_and_case() {
        let pop = FileNameGrammar::YearSuffix.parse("POPBR12").unwrap();
        assert_eq!(pop.prefix, "POPBR");
        assert_eq!(pop.year, Some(2012));
        assert!(FileNameGrammar::YearSuffix.parse("README").is_none());
        assert!(FileNameGrammar::Ciha.parse("cihaac1101").is_some());
    }
}
