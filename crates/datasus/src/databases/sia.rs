use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{SIA_GROUPS, find_group, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &[
    "/dissemin/publicos/SIASUS/199407_200712/Dados",
    "/dissemin/publicos/SIASUS/200801_/Dados",
];

/// Ambulatory production (Sistema de Informações Ambulatoriais).
///
/// Group codes have two to five letters. Months too large for one file are
/// split into `a`, `b`, ... parts (`PASP2301a`); every part matches the
/// month it belongs to.
#[derive(Debug)]
pub struct Sia {
    core: DatabaseCore,
}

impl Sia {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Sia {
    fn name(&self) -> &'static str {
        "SIA"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::SIA
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !file.has_extension("dbc") {
            return None;
        }
        FileNameGrammar::Sia
            .parse(&file.name)
            .filter(|parts| find_group(SIA_GROUPS, &parts.prefix).is_some())
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(SIA_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years", "months"])?;
        let filter = Filter {
            groups: validate_codes("group", SIA_GROUPS, &query.groups)?,
            ..Filter::from_query(query, &[])?
        };
        self.ensure_loaded()?;
        Ok(select_files(self, &filter))
    }
}
