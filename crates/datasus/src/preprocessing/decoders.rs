use super::{NAN_STRING, required_column, text_column};
use crate::errors::{DatasusError, DatasusResult};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const MINUTES_PER_HOUR: f64 = 60.0;
const MINUTES_PER_DAY: f64 = 24.0 * MINUTES_PER_HOUR;
const MINUTES_PER_MONTH: f64 = 30.0 * MINUTES_PER_DAY;
const MINUTES_PER_YEAR: f64 = 365.0 * MINUTES_PER_DAY;

/// Unit of a decoded age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgeUnit {
    #[default]
    #[serde(rename = "Y")]
    Years,
    #[serde(rename = "M")]
    Months,
    #[serde(rename = "D")]
    Days,
    #[serde(rename = "H")]
    Hours,
    #[serde(rename = "m")]
    Minutes,
}

impl AgeUnit {
    /// `Y`, `M`, `D`, `H` or `m`
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'Y' => Some(Self::Years),
            'M' => Some(Self::Months),
            'D' => Some(Self::Days),
            'H' => Some(Self::Hours),
            'm' => Some(Self::Minutes),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Years => 'Y',
            Self::Months => 'M',
            Self::Days => 'D',
            Self::Hours => 'H',
            Self::Minutes => 'm',
        }
    }

    /// Suffix of the decoded age column (`IDADE_ANOS`, ...)
    pub fn label(self) -> &'static str {
        match self {
            Self::Years => "ANOS",
            Self::Months => "MESES",
            Self::Days => "DIAS",
            Self::Hours => "HORAS",
            Self::Minutes => "MINUTOS",
        }
    }

    fn minutes(self) -> f64 {
        match self {
            Self::Years => MINUTES_PER_YEAR,
            Self::Months => MINUTES_PER_MONTH,
            Self::Days => MINUTES_PER_DAY,
            Self::Hours => MINUTES_PER_HOUR,
            Self::Minutes => 1.0,
        }
    }

    /// How many of this unit fit in a 365-day year
    fn per_year(self) -> f64 {
        MINUTES_PER_YEAR / self.minutes()
    }
}

/// Decodes a SINAN age: the thousands digit is the unit (1 hours, 2 days,
/// 3 months, 4 years) and the rest the magnitude.
///
/// Codes outside `1000..=4999` decode to `None`.
///
/// # Example
/// ```rust
/// use datasus::preprocessing::{AgeUnit, decode_age_sinan};
///
/// assert_eq!(decode_age_sinan(4010, AgeUnit::Years), Some(10.0));
/// assert_eq!(decode_age_sinan(3120, AgeUnit::Years), Some(10.0));
/// assert_eq!(decode_age_sinan(999, AgeUnit::Years), None);
/// ```
pub fn decode_age_sinan(code: i64, unit: AgeUnit) -> Option<f64> {
    let years = match code {
        4000..=4999 => (code - 4000) as f64,
        3000..=3999 => (code - 3000) as f64 / 12.0,
        2000..=2999 => (code - 2000) as f64 / 365.0,
        1000..=1999 => (code - 1000) as f64 / (365.0 * 24.0),
        _ => return None,
    };
    Some(years * unit.per_year())
}

/// Decodes a SIM age: the first character is the unit (0 minutes, 1 hours,
/// 2 days, 3 months, 4 years, 5 years above one hundred), the rest the
/// magnitude. Months count 30 days and years 365.
///
/// Anything else, including `000`, decodes to `None`.
pub fn decode_age_sim(code: &str, unit: AgeUnit) -> Option<f64> {
    let code = code.trim();
    let mut chars = code.chars();
    let kind = chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits.parse::<u32>().ok()? as f64;
    let minutes = match kind {
        '0' if magnitude > 0.0 => magnitude,
        '1' => magnitude * MINUTES_PER_HOUR,
        '2' => magnitude * MINUTES_PER_DAY,
        '3' => magnitude * MINUTES_PER_MONTH,
        '4' => magnitude * MINUTES_PER_YEAR,
        '5' => (magnitude + 100.0) * MINUTES_PER_YEAR,
        _ => return None,
    };
    Some(minutes / unit.minutes())
}

/// Decodes an age column of SINAN codes (integers, or text holding them)
pub fn decode_ages_sinan(column: &ArrayRef, unit: AgeUnit) -> DatasusResult<Float64Array> {
    let codes = cast(column, &DataType::Int64)?;
    Ok(codes
        .as_primitive::<Int64Type>()
        .iter()
        .map(|code| code.and_then(|c| decode_age_sinan(c, unit)))
        .collect())
}

/// Decodes an age column of SIM codes
pub fn decode_ages_sim(column: &ArrayRef, unit: AgeUnit) -> DatasusResult<Float64Array> {
    let codes = text_column(column)?;
    Ok(codes
        .iter()
        .map(|code| code.and_then(|c| decode_age_sim(c, unit)))
        .collect())
}

pub fn decode_sex(code: &str) -> Option<&'static str> {
    match code.trim() {
        "1" => Some("Masculino"),
        "2" => Some("Feminino"),
        _ => None,
    }
}

pub fn decode_race(code: &str) -> Option<&'static str> {
    match code.trim() {
        "1" => Some("Branca"),
        "2" => Some("Preta"),
        "3" => Some("Amarela"),
        "4" => Some("Parda"),
        "5" => Some("Indígena"),
        _ => None,
    }
}

const GEOCODE_WEIGHTS: [u32; 6] = [1, 2, 1, 2, 1, 2];

fn geocode_digits(geocode: u64) -> Vec<u32> {
    geocode
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect()
}

/// Check digit of a municipality code, computed over its first six digits
pub fn calculate_digit(geocode: u64) -> DatasusResult<u32> {
    let digits = geocode_digits(geocode);
    if !(6..=7).contains(&digits.len()) {
        return Err(DatasusError::validation("geocode", [geocode.to_string()]));
    }
    let sum: u32 = digits
        .iter()
        .zip(GEOCODE_WEIGHTS)
        .map(|(digit, weight)| {
            let value = digit * weight;
            if value > 9 { value / 10 + value % 10 } else { value }
        })
        .sum();
    Ok(if sum % 10 == 0 { 0 } else { 10 - sum % 10 })
}

/// Whether a seven-digit municipality code ends in its check digit
///
/// # Example
/// ```rust
/// use datasus::preprocessing::is_valid_geocode;
///
/// assert!(is_valid_geocode(3304557).unwrap());
/// assert!(!is_valid_geocode(3304550).unwrap());
/// assert!(is_valid_geocode(330455).is_err());
/// ```
pub fn is_valid_geocode(geocode: u64) -> DatasusResult<bool> {
    if geocode_digits(geocode).len() != 7 {
        return Err(DatasusError::validation("geocode", [geocode.to_string()]));
    }
    Ok(geocode % 10 == u64::from(calculate_digit(geocode)?))
}

/// Appends the check digit to a six-digit code; seven-digit codes are
/// returned unchanged
pub fn add_check_digit(geocode: u64) -> DatasusResult<u64> {
    match geocode_digits(geocode).len() {
        7 => Ok(geocode),
        6 => Ok(geocode * 10 + u64::from(calculate_digit(geocode)?)),
        _ => Err(DatasusError::validation("geocode", [geocode.to_string()])),
    }
}

/// A chapter of the CID-10, covering three-character codes `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cid10Chapter {
    pub number: u8,
    pub numeral: &'static str,
    pub start: &'static str,
    pub end: &'static str,
    pub description: &'static str,
}

const fn chapter(
    number: u8,
    numeral: &'static str,
    start: &'static str,
    end: &'static str,
    description: &'static str,
) -> Cid10Chapter {
    Cid10Chapter {
        number,
        numeral,
        start,
        end,
        description,
    }
}

/// Symptoms, signs and ill-defined conditions
pub const ILL_DEFINED_CHAPTER: u8 = 18;

pub static CID10_CHAPTERS: &[Cid10Chapter] = &[
    chapter(1, "I", "A00", "B99", "Algumas doenças infecciosas e parasitárias"),
    chapter(2, "II", "C00", "D48", "Neoplasias (tumores)"),
    chapter(
        3,
        "III",
        "D50",
        "D89",
        "Doenças do sangue e dos órgãos hematopoéticos e alguns transtornos imunitários",
    ),
    chapter(4, "IV", "E00", "E90", "Doenças endócrinas, nutricionais e metabólicas"),
    chapter(5, "V", "F00", "F99", "Transtornos mentais e comportamentais"),
    chapter(6, "VI", "G00", "G99", "Doenças do sistema nervoso"),
    chapter(7, "VII", "H00", "H59", "Doenças do olho e anexos"),
    chapter(8, "VIII", "H60", "H95", "Doenças do ouvido e da apófise mastóide"),
    chapter(9, "IX", "I00", "I99", "Doenças do aparelho circulatório"),
    chapter(10, "X", "J00", "J99", "Doenças do aparelho respiratório"),
    chapter(11, "XI", "K00", "K93", "Doenças do aparelho digestivo"),
    chapter(12, "XII", "L00", "L99", "Doenças da pele e do tecido subcutâneo"),
    chapter(
        13,
        "XIII",
        "M00",
        "M99",
        "Doenças do sistema osteomuscular e do tecido conjuntivo",
    ),
    chapter(14, "XIV", "N00", "N99", "Doenças do aparelho geniturinário"),
    chapter(15, "XV", "O00", "O99", "Gravidez, parto e puerpério"),
    chapter(16, "XVI", "P00", "P96", "Algumas afecções originadas no período perinatal"),
    chapter(
        17,
        "XVII",
        "Q00",
        "Q99",
        "Malformações congênitas, deformidades e anomalias cromossômicas",
    ),
    chapter(
        18,
        "XVIII",
        "R00",
        "R99",
        "Sintomas, sinais e achados anormais de exames clínicos e de laboratório",
    ),
    chapter(
        19,
        "XIX",
        "S00",
        "T98",
        "Lesões, envenenamento e algumas outras conseqüências de causas externas",
    ),
    chapter(20, "XX", "V01", "Y98", "Causas externas de morbidade e de mortalidade"),
    chapter(
        21,
        "XXI",
        "Z00",
        "Z99",
        "Fatores que influenciam o estado de saúde e o contato com os serviços de saúde",
    ),
    chapter(22, "XXII", "U04", "U99", "Códigos para propósitos especiais"),
];

/// Chapter number of a CID-10 code such as `I219` or `R99`, from its first
/// three characters
pub fn cid10_chapter(code: &str) -> Option<u8> {
    let category: String = code.trim().chars().take(3).collect::<String>().to_uppercase();
    let mut chars = category.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.clone().count() == 2
        && chars.all(|c| c.is_ascii_digit());
    if !valid {
        return None;
    }
    CID10_CHAPTERS
        .iter()
        .find(|ch| ch.start <= category.as_str() && category.as_str() <= ch.end)
        .map(|ch| ch.number)
}

/// Left-closed age bins `[start, start + width)`, up to `end`, optionally
/// followed by an open class `[end, inf)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeClasses {
    pub start: f64,
    pub end: f64,
    pub width: f64,
    pub open_end: bool,
}

impl Default for AgeClasses {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 90.0,
            width: 1.0,
            open_end: true,
        }
    }
}

impl AgeClasses {
    /// Class bounds in order; empty when the width is not positive
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = Vec::new();
        if !(self.width > 0.0 && self.start.is_finite() && self.end.is_finite()) {
            return bounds;
        }
        let mut low = self.start;
        while low < self.end {
            let high = (low + self.width).min(self.end);
            bounds.push((low, high));
            low = high;
        }
        if self.open_end {
            bounds.push((self.end, f64::INFINITY));
        }
        bounds
    }

    /// Label of the class holding `age`
    pub fn classify(&self, age: f64) -> Option<String> {
        class_label(&self.bounds(), age)
    }
}

fn class_label(bounds: &[(f64, f64)], age: f64) -> Option<String> {
    bounds
        .iter()
        .find(|(low, high)| *low <= age && age < *high)
        .map(|(low, high)| format!("[{low}, {high})"))
}

/// Bins `ages`; ages outside every class, and nulls, stay null
pub fn classify_age(ages: &Float64Array, classes: &AgeClasses) -> StringArray {
    let bounds = classes.bounds();
    ages.iter()
        .map(|age| age.and_then(|age| class_label(&bounds, age)))
        .collect()
}

/// Options of [`translate_sim_variables`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTranslateOptions {
    pub age_unit: AgeUnit,
    /// Bins the decoded age instead of keeping it numeric
    pub age_classes: Option<AgeClasses>,
    /// Adds `CID10_CHAPTER` from `CAUSABAS`
    pub classify_cid10_chapters: bool,
    /// Appends check digits to six-digit residence codes
    pub geocode_dv: bool,
    pub nan_string: String,
    /// Known municipality codes; without it codes are checked by their
    /// check digit
    pub valid_geocodes: Option<HashSet<u64>>,
}

impl Default for SimTranslateOptions {
    fn default() -> Self {
        Self {
            age_unit: AgeUnit::Years,
            age_classes: None,
            classify_cid10_chapters: false,
            geocode_dv: true,
            nan_string: NAN_STRING.to_string(),
            valid_geocodes: None,
        }
    }
}

/// Translates the coded columns of a SIM frame into readable categories.
///
/// - `IDADE` gains a decoded sibling `IDADE_<unit>` (numeric, or binned
///   when `age_classes` is set)
/// - `SEXO` and `RACACOR` become their labels
/// - `MUNIRES` is renamed `CODMUNRES`; residence codes that do not check
///   out become missing
/// - `CID10_CHAPTER` is appended when asked for
///
/// Missing categories are spelled `nan_string`. Other columns pass through.
pub fn translate_sim_variables(
    frame: &RecordBatch,
    options: &SimTranslateOptions,
) -> DatasusResult<RecordBatch> {
    let nan = options.nan_string.as_str();
    let schema = frame.schema();
    let mut fields: Vec<Field> = Vec::with_capacity(frame.num_columns() + 2);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(frame.num_columns() + 2);

    for (field, column) in schema.fields().iter().zip(frame.columns()) {
        let name = match field.name().as_str() {
            "MUNIRES" => "CODMUNRES",
            other => other,
        };
        let translated = match name {
            "SEXO" => Some(map_labels(column, decode_sex, nan)?),
            "RACACOR" => Some(map_labels(column, decode_race, nan)?),
            "CODMUNRES" => Some(translate_geocodes(column, options)?),
            _ => None,
        };
        match translated {
            Some(array) => {
                fields.push(Field::new(name, DataType::Utf8, false));
                columns.push(array);
            }
            None => {
                fields.push(field.as_ref().clone().with_name(name));
                columns.push(column.clone());
            }
        }

        if name == "IDADE" {
            let ages = decode_ages_sim(column, options.age_unit)?;
            let age_name = format!("IDADE_{}", options.age_unit.label());
            match &options.age_classes {
                Some(classes) => {
                    let binned = fill_missing(&classify_age(&ages, classes), nan);
                    fields.push(Field::new(age_name, DataType::Utf8, false));
                    columns.push(Arc::new(binned));
                }
                None => {
                    fields.push(Field::new(age_name, DataType::Float64, true));
                    columns.push(Arc::new(ages));
                }
            }
        }
    }

    if options.classify_cid10_chapters {
        let causes = text_column(required_column(frame, "CAUSABAS")?)?;
        let chapters: StringArray = causes
            .iter()
            .map(|cause| {
                Some(
                    cause
                        .and_then(cid10_chapter)
                        .map(|ch| ch.to_string())
                        .unwrap_or_else(|| nan.to_string()),
                )
            })
            .collect();
        fields.push(Field::new("CID10_CHAPTER", DataType::Utf8, false));
        columns.push(Arc::new(chapters));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn map_labels(
    column: &ArrayRef,
    decode: fn(&str) -> Option<&'static str>,
    nan: &str,
) -> DatasusResult<ArrayRef> {
    let codes = text_column(column)?;
    let labels: StringArray = codes
        .iter()
        .map(|code| Some(code.and_then(decode).unwrap_or(nan)))
        .collect();
    Ok(Arc::new(labels))
}

fn translate_geocodes(column: &ArrayRef, options: &SimTranslateOptions) -> DatasusResult<ArrayRef> {
    let codes = text_column(column)?;
    let nan = options.nan_string.as_str();
    let translated: StringArray = codes
        .iter()
        .map(|code| {
            let geocode = code
                .and_then(|c| c.trim().parse::<u64>().ok())
                .and_then(|c| {
                    if options.geocode_dv {
                        add_check_digit(c).ok()
                    } else {
                        Some(c)
                    }
                })
                .filter(|c| match &options.valid_geocodes {
                    Some(valid) => valid.contains(c),
                    None => is_valid_geocode(*c).unwrap_or(false),
                });
            Some(geocode.map(|c| c.to_string()).unwrap_or_else(|| nan.to_string()))
        })
        .collect();
    Ok(Arc::new(translated))
}

fn fill_missing(array: &StringArray, nan: &str) -> StringArray {
    array
        .iter()
        .map(|value| Some(value.unwrap_or(nan)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Float64Type;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_decode_age_sinan() {
        assert_eq!(decode_age_sinan(4010, AgeUnit::Years), Some(10.0));
        assert_eq!(decode_age_sinan(3120, AgeUnit::Years), Some(10.0));
        assert!(close(decode_age_sinan(2365, AgeUnit::Years).unwrap(), 1.0));
        let hours = decode_age_sinan(1480, AgeUnit::Years).unwrap();
        assert!((hours - 0.0548).abs() < 1e-4);
        assert_eq!(decode_age_sinan(4002, AgeUnit::Months), Some(24.0));
        assert_eq!(decode_age_sinan(5000, AgeUnit::Years), None);
        assert_eq!(decode_age_sinan(0, AgeUnit::Years), None);
        assert_eq!(decode_age_sinan(-4010, AgeUnit::Years), None);
    }

    #[test]
    fn test_decode_age_sim() {
        assert!(close(decode_age_sim("501", AgeUnit::Years).unwrap(), 101.0));
        assert!(close(decode_age_sim("010", AgeUnit::Minutes).unwrap(), 10.0));
        assert!(close(decode_age_sim("430", AgeUnit::Years).unwrap(), 30.0));
        assert!(close(decode_age_sim("306", AgeUnit::Days).unwrap(), 180.0));
        assert!(close(decode_age_sim("112", AgeUnit::Days).unwrap(), 0.5));
        assert_eq!(decode_age_sim("000", AgeUnit::Years), None);
        assert_eq!(decode_age_sim("999", AgeUnit::Years), None);
        assert_eq!(decode_age_sim("4", AgeUnit::Years), None);
        assert_eq!(decode_age_sim("4x0", AgeUnit::Years), None);
        assert_eq!(decode_age_sim("", AgeUnit::Years), None);
    }

    #[test]
    fn test_decode_age_columns() {
        let sinan: ArrayRef = Arc::new(StringArray::from(vec![Some("4025"), Some("x"), None]));
        let ages = decode_ages_sinan(&sinan, AgeUnit::Years).unwrap();
        assert_eq!(ages.value(0), 25.0);
        assert!(ages.is_null(1));
        assert!(ages.is_null(2));

        let sim: ArrayRef = Arc::new(StringArray::from(vec!["501", "000"]));
        let ages = decode_ages_sim(&sim, AgeUnit::Years).unwrap();
        assert!(close(ages.value(0), 101.0));
        assert!(ages.is_null(1));
    }

    #[test]
    fn test_sex_and_race() {
        assert_eq!(decode_sex("1"), Some("Masculino"));
        assert_eq!(decode_sex(" 2"), Some("Feminino"));
        assert_eq!(decode_sex("9"), None);
        assert_eq!(decode_race("5"), Some("Indígena"));
        assert_eq!(decode_race("6"), None);
        assert_eq!(decode_race(""), None);
    }

    #[test]
    fn test_geocodes() {
        assert!(is_valid_geocode(3304557).unwrap());
        assert_eq!(add_check_digit(330455).unwrap(), 3304557);
        assert_eq!(add_check_digit(3304557).unwrap(), 3304557);
        assert!(add_check_digit(12345).is_err());
        assert!(is_valid_geocode(33045570).is_err());

        for code in (100_000..=999_999).step_by(7919) {
            let full = add_check_digit(code).unwrap();
            assert!(is_valid_geocode(full).unwrap(), "{code}");
        }
    }

    #[test]
    fn test_cid10_chapters() {
        assert_eq!(CID10_CHAPTERS.len(), 22);
        assert_eq!(cid10_chapter("A00"), Some(1));
        assert_eq!(cid10_chapter("i219"), Some(9));
        assert_eq!(cid10_chapter("R99"), Some(ILL_DEFINED_CHAPTER));
        assert_eq!(cid10_chapter("T98"), Some(19));
        assert_eq!(cid10_chapter("X59"), Some(20));
        assert_eq!(cid10_chapter("U07"), Some(22));
        assert_eq!(cid10_chapter("D49"), None);
        assert_eq!(cid10_chapter("9AB"), None);
        assert_eq!(cid10_chapter("A"), None);
    }

    #[test]
    fn test_classify_age() {
        let classes = AgeClasses {
            start: 0.0,
            end: 20.0,
            width: 10.0,
            open_end: true,
        };
        let ages = Float64Array::from(vec![Some(0.0), Some(9.99), Some(10.0), Some(101.0), None]);
        let labels = classify_age(&ages, &classes);
        assert_eq!(labels.value(0), "[0, 10)");
        assert_eq!(labels.value(1), "[0, 10)");
        assert_eq!(labels.value(2), "[10, 20)");
        assert_eq!(labels.value(3), "[20, inf)");
        assert!(labels.is_null(4));

        let closed = AgeClasses {
            open_end: false,
            ..classes
        };
        assert_eq!(closed.classify(25.0), None);
        assert_eq!(AgeClasses::default().bounds().len(), 91);
    }

    fn sim_frame() -> RecordBatch {
        let text = |values: Vec<&str>| Arc::new(StringArray::from(values)) as ArrayRef;
        let schema = Schema::new(vec![
            Field::new("IDADE", DataType::Utf8, true),
            Field::new("SEXO", DataType::Utf8, true),
            Field::new("MUNIRES", DataType::Utf8, true),
            Field::new("RACACOR", DataType::Utf8, true),
            Field::new("CAUSABAS", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                text(vec!["501", "010", "410"]),
                text(vec!["1", "2", "9"]),
                text(vec!["330455", "3304557", "3304550"]),
                text(vec!["1", "5", ""]),
                text(vec!["I219", "R99", "A09"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_translate_sim_variables() {
        let options = SimTranslateOptions {
            classify_cid10_chapters: true,
            ..SimTranslateOptions::default()
        };
        let out = translate_sim_variables(&sim_frame(), &options).unwrap();
        let schema = out.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["IDADE", "IDADE_ANOS", "SEXO", "CODMUNRES", "RACACOR", "CAUSABAS", "CID10_CHAPTER"]
        );

        let ages = out.column(1).as_primitive::<Float64Type>();
        assert!(close(ages.value(0), 101.0));
        assert!(close(ages.value(2), 10.0));

        let text = |i: usize| {
            let column = out.column(i).as_string::<i32>();
            (0..column.len()).map(|j| column.value(j).to_string()).collect::<Vec<_>>()
        };
        assert_eq!(text(2), vec!["Masculino", "Feminino", "nan"]);
        assert_eq!(text(3), vec!["3304557", "3304557", "nan"]);
        assert_eq!(text(4), vec!["Branca", "Indígena", "nan"]);
        assert_eq!(text(6), vec!["9", "18", "1"]);
    }

    #[test]
    fn test_translate_with_classes_and_known_geocodes() {
        let options = SimTranslateOptions {
            age_classes: Some(AgeClasses::default()),
            valid_geocodes: Some(HashSet::from([3304557])),
            geocode_dv: false,
            nan_string: "ignorado".to_string(),
            ..SimTranslateOptions::default()
        };
        let out = translate_sim_variables(&sim_frame(), &options).unwrap();
        let ages = out.column(1).as_string::<i32>();
        assert_eq!(ages.value(0), "[90, inf)");
        assert_eq!(ages.value(1), "[0, 1)");
        let codes = out.column(3).as_string::<i32>();
        assert_eq!(codes.value(0), "ignorado");
        assert_eq!(codes.value(1), "3304557");
        assert_eq!(out.schema().field(out.num_columns() - 1).name(), "CAUSABAS");
    }

    #[test]
    fn test_cid10_requires_cause_column() {
        let frame = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("SEXO", DataType::Utf8, true)])),
            vec![Arc::new(StringArray::from(vec!["1"])) as ArrayRef],
        )
        .unwrap();
        let options = SimTranslateOptions {
            classify_cid10_chapters: true,
            ..SimTranslateOptions::default()
        };
        assert!(matches!(
            translate_sim_variables(&frame, &options),
            Err(DatasusError::Validation { field: "column", .. })
        ));
    }
}
