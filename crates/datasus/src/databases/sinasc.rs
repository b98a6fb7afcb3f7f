use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{SINASC_GROUPS, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &[
    "/dissemin/publicos/SINASC/NOV/DNRES",
    "/dissemin/publicos/SINASC/ANT/DNRES",
];

/// Residents abroad (`DNEX2021`)
pub const ABROAD_UF: &str = "EX";

/// Live-birth records (Sistema de Informações sobre Nascidos Vivos)
#[derive(Debug)]
pub struct Sinasc {
    core: DatabaseCore,
}

impl Sinasc {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Sinasc {
    fn name(&self) -> &'static str {
        "SINASC"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::SINASC
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !file.has_extension("dbc") {
            return None;
        }
        FileNameGrammar::Sinasc
            .parse(&file.name)
            .or_else(|| FileNameGrammar::SinascOld.parse(&file.name))
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        let mut description = Description::of(file).with_fields(&fields, Some(SINASC_GROUPS));
        if fields.uf.as_deref() == Some(ABROAD_UF) {
            description.uf = None;
        }
        Some(description)
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years"])?;
        let groups = validate_codes("group", SINASC_GROUPS, &query.groups)?;
        let filter = Filter {
            groups,
            ..Filter::from_query(query, &[ABROAD_UF])?
        };
        self.ensure_loaded()?;
        Ok(select_files(self, &filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::test_support::{mirror, names};
    use crate::errors::DatasusError;

    fn sinasc() -> (tempfile::TempDir, Sinasc) {
        let (tmp, catalog) = mirror(&[
            "dissemin/publicos/SINASC/NOV/DNRES/DNAC2020.dbc",
            "dissemin/publicos/SINASC/NOV/DNRES/DNEX2021.dbc",
            "dissemin/publicos/SINASC/NOV/DNRES/DNSP2021.dbc",
            "dissemin/publicos/SINASC/ANT/DNRES/DNRAC95.dbc",
        ]);
        (tmp, Sinasc::new(catalog))
    }

    #[test]
    fn test_get_files() {
        let (_tmp, sinasc) = sinasc();
        let files = sinasc
            .get_files(&FileQuery::new().ufs(["AC", "SP"]).years([1995, 2021]))
            .unwrap();
        assert_eq!(names(&files), vec!["DNSP2021.dbc", "DNRAC95.dbc"]);

        let old = sinasc.get_files(&FileQuery::new().group("DNR")).unwrap();
        assert_eq!(names(&old), vec!["DNRAC95.dbc"]);
    }

    #[test]
    fn test_abroad_residents() {
        let (_tmp, sinasc) = sinasc();
        let files = sinasc.get_files(&FileQuery::new().uf("ex")).unwrap();
        assert_eq!(names(&files), vec!["DNEX2021.dbc"]);

        let description = sinasc.describe(&files[0]).unwrap();
        assert_eq!(description.uf, None);
        assert_eq!(description.year, Some(2021));
        assert_eq!(description.group.as_deref(), Some("Declarações de Nascidos Vivos"));
    }

    #[test]
    fn test_validation() {
        let (_tmp, sinasc) = sinasc();
        assert!(matches!(
            sinasc.get_files(&FileQuery::new().uf("ZZ")),
            Err(DatasusError::Validation { field: "uf", .. })
        ));
        assert!(matches!(
            sinasc.get_files(&FileQuery::new().group("DO")),
            Err(DatasusError::Validation { field: "group", .. })
        ));
    }
}
