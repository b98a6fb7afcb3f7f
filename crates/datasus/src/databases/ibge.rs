use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::{DatasusError, DatasusResult};
use crate::models::directory::{Directory, FtpCatalog};
use crate::models::file::File;
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};
use std::sync::Arc;

const ROOT: &str = "/dissemin/publicos/IBGE";

/// Source directories under the IBGE root
pub const SOURCES: &[&str] = &["POP", "censo", "POPTCU", "projpop"];

pub const DEFAULT_SOURCE: &str = "POPTCU";

/// Population estimates, censuses and projections republished by DATASUS.
///
/// Each source lives in its own directory; a query looks at one source
/// (`POPTCU` unless told otherwise) and filters it by the two-digit year
/// that ends every file name.
#[derive(Debug)]
pub struct IbgeDatasus {
    core: DatabaseCore,
}

impl IbgeDatasus {
    pub fn new(catalog: FtpCatalog) -> Self {
        let paths: Vec<String> = SOURCES.iter().map(|s| format!("{ROOT}/{s}")).collect();
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        Self {
            core: DatabaseCore::new(catalog, &paths),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }

    /// Canonical spelling of `source` (case insensitive)
    pub fn resolve_source(source: &str) -> DatasusResult<&'static str> {
        SOURCES
            .iter()
            .find(|s| s.eq_ignore_ascii_case(source.trim()))
            .copied()
            .ok_or_else(|| DatasusError::validation("source", [source]))
    }

    fn source_directory(&self, source: &str) -> Option<&Arc<Directory>> {
        self.core.paths().iter().find(|dir| dir.name == source)
    }
}

impl Database for IbgeDatasus {
    fn name(&self) -> &'static str {
        "IBGE-DataSUS"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::IBGE_DATASUS
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("zip") || file.has_extension("dbf")) {
            return None;
        }
        let parts = FileNameGrammar::YearSuffix.parse(&file.name)?;
        let source = file.parent_path.rsplit('/').next()?;
        Some(FileFields {
            year: parts.year,
            source: SOURCES.contains(&source).then(|| source.to_string()),
            ..FileFields::default()
        })
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        let mut description = Description::of(file).with_fields(&fields, None);
        description.source = fields.source;
        Some(description)
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["source", "years"])?;
        let source = Self::resolve_source(query.source.as_deref().unwrap_or(DEFAULT_SOURCE))?;
        let filter = Filter::from_query(query, &[])?;
        let directory = self
            .source_directory(source)
            .cloned()
            .ok_or_else(|| DatasusError::NotFound(format!("{ROOT}/{source}")))?;

        self.load_directories(std::slice::from_ref(&directory))?;
        Ok(select_files(self, &filter)
            .into_iter()
            .filter(|file| file.parent_path == directory.path)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::test_support::{mirror, names};

    fn ibge() -> (tempfile::TempDir, IbgeDatasus) {
        let (tmp, catalog) = mirror(&[
            "dissemin/publicos/IBGE/POPTCU/POPTBR10.zip",
            "dissemin/publicos/IBGE/POPTCU/POPTBR11.zip",
            "dissemin/publicos/IBGE/POPTCU/leiame.txt",
            "dissemin/publicos/IBGE/censo/CENSBR10.dbf",
        ]);
        (tmp, IbgeDatasus::new(catalog))
    }

    #[test]
    fn test_default_source() {
        let (_tmp, ibge) = ibge();
        let files = ibge.get_files(&FileQuery::new().year(2011)).unwrap();
        assert_eq!(names(&files), vec!["POPTBR11.zip"]);

        // only the queried source was listed
        let loaded: Vec<bool> = ibge.paths().iter().map(|d| d.is_loaded()).collect();
        assert_eq!(loaded, vec![false, false, true, false]);
    }

    #[test]
    fn test_source_is_case_insensitive() {
        let (_tmp, ibge) = ibge();
        let files = ibge.get_files(&FileQuery::new().source("CENSO")).unwrap();
        assert_eq!(names(&files), vec!["CENSBR10.dbf"]);

        let description = ibge.describe(&files[0]).unwrap();
        assert_eq!(description.source.as_deref(), Some("censo"));
        assert_eq!(description.year, Some(2010));
        assert!(description.group.is_none());
    }

    #[test]
    fn test_unknown_source() {
        let (_tmp, ibge) = ibge();
        match ibge.get_files(&FileQuery::new().source("SIDRA")) {
            Err(DatasusError::Validation { field, values }) => {
                assert_eq!(field, "source");
                assert_eq!(values, vec!["SIDRA"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ibge.get_files(&FileQuery::new().uf("SP")).is_err());
    }

    #[test]
    fn test_non_data_files() {
        let (_tmp, ibge) = ibge();
        ibge.get_files(&FileQuery::new()).unwrap();
        assert_eq!(names(&ibge.unrecognized_files()), vec!["leiame.txt"]);
    }
}
