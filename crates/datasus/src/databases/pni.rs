use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{PNI_GROUPS, find_group, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &["/dissemin/publicos/PNI/DADOS"];

/// Immunization program tables, `{CPNI|DPNI}{UF}{YY}`
#[derive(Debug)]
pub struct Pni {
    core: DatabaseCore,
}

impl Pni {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Pni {
    fn name(&self) -> &'static str {
        "PNI"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::PNI
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        FileNameGrammar::Pni
            .parse(&file.name)
            .filter(|parts| find_group(PNI_GROUPS, &parts.prefix).is_some())
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(PNI_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years"])?;
        let filter = Filter {
            groups: validate_codes("group", PNI_GROUPS, &query.groups)?,
            ..Filter::from_query(query, &[])?
        };
        self.ensure_loaded()?;
        Ok(select_files(self, &filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::test_support::{mirror, names};

    #[test]
    fn test_get_files_and_describe() {
        let (_tmp, catalog) = mirror(&[
            "dissemin/publicos/PNI/DADOS/CPNIAC19.DBF",
            "dissemin/publicos/PNI/DADOS/DPNIAC19.DBF",
            "dissemin/publicos/PNI/DADOS/DPNIBR19.DBF",
            "dissemin/publicos/PNI/DADOS/DPNIAC20.DBF",
        ]);
        let pni = Pni::new(catalog);
        let files = pni
            .get_files(&FileQuery::new().group("DPNI").ufs(["AC", "BR"]).year(2019))
            .unwrap();
        assert_eq!(names(&files), vec!["DPNIAC19.DBF", "DPNIBR19.DBF"]);

        let description = pni.describe(&files[1]).unwrap();
        assert_eq!(description.group.as_deref(), Some("Doses Aplicadas"));
        assert_eq!(description.uf.as_deref(), Some("Brasil"));
        assert_eq!(description.year, Some(2019));
    }

    #[test]
    fn test_unknown_group() {
        let (_tmp, catalog) = mirror(&[]);
        let pni = Pni::new(catalog);
        assert!(pni.get_files(&FileQuery::new().group("CNPI")).is_err());
    }
}
