use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::dtypes::{ColumnType, TypeTable};
use crate::models::file::File;
use crate::models::group_info::{SINAN_DISEASES, find_group, group_name, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;

const PATHS: &[&str] = &[
    "/dissemin/publicos/SINAN/DADOS/FINAIS",
    "/dissemin/publicos/SINAN/DADOS/PRELIM",
];

/// Published names that do not follow `{disease}BR{YY}`, with the disease
/// they belong to
const MISNAMED: &[(&str, &str)] = &[("LEIBR22", "LEIV"), ("LERBR19", "LERD")];

/// Publication stage of a SINAN file, taken from its directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SinanStage {
    /// Closed, consolidated years
    Finais,
    /// Years still receiving notifications
    Prelim,
}

impl SinanStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finais => "FINAIS",
            Self::Prelim => "PRELIM",
        }
    }

    /// Stage named by the last segment of a directory path
    pub fn from_path(path: &str) -> Option<Self> {
        let segment = path.trim_end_matches('/').rsplit('/').next()?;
        if segment.eq_ignore_ascii_case("FINAIS") {
            Some(Self::Finais)
        } else if segment.eq_ignore_ascii_case("PRELIM") {
            Some(Self::Prelim)
        } else {
            None
        }
    }
}

impl fmt::Display for SinanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifiable diseases (Sistema de Informação de Agravos de Notificação).
///
/// One national file per disease and year, `{disease}BR{YY}`, published
/// under `FINAIS` or `PRELIM`.
#[derive(Debug)]
pub struct Sinan {
    core: DatabaseCore,
}

impl Sinan {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }

    /// Column types of SINAN tables, for [`crate::models::local::Table::to_frame_with`]
    pub fn type_table() -> TypeTable {
        TypeTable::new()
            .with("NU_*", ColumnType::Numeric)
            .with("ID_*", ColumnType::Numeric)
            .with("SEM_*", ColumnType::EpiWeek)
            .with("DT_*", ColumnType::Date)
    }

    fn disease_code(stem: &str) -> Option<(String, Option<i32>)> {
        let parts = FileNameGrammar::Sinan.parse(stem)?;
        let code = MISNAMED
            .iter()
            .find(|(name, _)| stem.eq_ignore_ascii_case(name))
            .map(|(_, disease)| disease.to_string())
            .unwrap_or(parts.prefix);
        Some((code, parts.year))
    }
}

impl Database for Sinan {
    fn name(&self) -> &'static str {
        "SINAN"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::SINAN
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        let (disease, year) = Self::disease_code(&file.name)?;
        find_group(SINAN_DISEASES, &disease)?;
        Some(FileFields {
            disease: Some(disease),
            year,
            stage: SinanStage::from_path(&file.parent_path),
            ..FileFields::default()
        })
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        let mut description = Description::of(file).with_fields(&fields, None);
        description.disease = fields
            .disease
            .as_deref()
            .and_then(|code| group_name(SINAN_DISEASES, code))
            .map(str::to_string);
        description.stage = fields.stage;
        Some(description)
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["diseases", "years", "stage"])?;
        let filter = Filter {
            diseases: validate_codes("disease", SINAN_DISEASES, &query.diseases)?,
            ..Filter::from_query(query, &[])?
        };
        self.ensure_loaded()?;
        Ok(select_files(self, &filter))
    }
}
