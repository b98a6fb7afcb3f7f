use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::{Directory, FtpCatalog};
use crate::models::file::File;
use crate::models::group_info::{CNES_GROUPS, find_group, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

const PATHS: &[&str] = &["/dissemin/publicos/CNES/200508_/Dados"];

/// Template name left on the server next to the data files
const IGNORED_NAMES: &[&str] = &["GMufAAmm"];

/// Health establishments registry (Cadastro Nacional de Estabelecimentos
/// de Saúde).
///
/// The data directory holds one subdirectory per group. [`Cnes::load_groups`]
/// descends into the requested ones, each at most once; `get_files` loads
/// the groups it is asked for.
#[derive(Debug)]
pub struct Cnes {
    core: DatabaseCore,
    loaded_groups: Mutex<HashSet<String>>,
}

impl Cnes {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
            loaded_groups: Mutex::new(HashSet::new()),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }

    /// Loads the subdirectories of `groups` into the content
    pub fn load_groups<S: AsRef<str>>(&self, groups: &[S]) -> DatasusResult<&Self> {
        let groups = validate_codes("group", CNES_GROUPS, groups)?;
        self.ensure_loaded()?;
        for group in groups {
            if self.loaded().contains(&group) {
                continue;
            }
            let directory = self.group_directory(&group);
            self.core.load_directories(&[directory])?;
            log::debug!("CNES group {} loaded", group);
            self.loaded().insert(group);
        }
        Ok(self)
    }

    /// Groups whose subdirectories are already in the content
    pub fn loaded_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.loaded().iter().cloned().collect();
        groups.sort();
        groups
    }

    fn group_directory(&self, group: &str) -> Arc<Directory> {
        Directory::child(&self.core.paths()[0], group)
    }

    fn loaded(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.loaded_groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Database for Cnes {
    fn name(&self) -> &'static str {
        "CNES"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::CNES
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn ignored_names(&self) -> &'static [&'static str] {
        IGNORED_NAMES
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        if IGNORED_NAMES.iter().any(|name| file.name.eq_ignore_ascii_case(name)) {
            return None;
        }
        FileNameGrammar::Monthly
            .parse(&file.name)
            .filter(|parts| find_group(CNES_GROUPS, &parts.prefix).is_some())
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(CNES_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years", "months"])?;
        let filter = Filter {
            groups: validate_codes("group", CNES_GROUPS, &query.groups)?,
            ..Filter::from_query(query, &[])?
        };
        let groups: Vec<&str> = if filter.groups.is_empty() {
            CNES_GROUPS.iter().map(|g| g.code).collect()
        } else {
            filter.groups.iter().map(String::as_str).collect()
        };
        self.load_groups(&groups)?;
        Ok(select_files(self, &filter))
    }
}
