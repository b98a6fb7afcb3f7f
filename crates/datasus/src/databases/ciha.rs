use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{CIHA_GROUPS, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &["/dissemin/publicos/CIHA/201101_/Dados"];

/// Hospital and ambulatory admission communications, `CIHA{UF}{YY}{MM}`
#[derive(Debug)]
pub struct Ciha {
    core: DatabaseCore,
}

impl Ciha {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Ciha {
    fn name(&self) -> &'static str {
        "CIHA"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::CIHA
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        FileNameGrammar::Ciha.parse(&file.name).map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(CIHA_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years", "months"])?;
        let filter = Filter {
            groups: validate_codes("group", CIHA_GROUPS, &query.groups)?,
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
    use crate::models::file_info::FileInfo;

    #[test]
    fn test_format() {
        let (_tmp, catalog) = mirror(&[]);
        let ciha = Ciha::new(catalog);
        let file = File::new("/", "CIHAAC1101.dbc", FileInfo::file(1, Default::default()));
        let fields = ciha.format(&file).unwrap();
        assert_eq!(fields.group.as_deref(), Some("CIHA"));
        assert_eq!(fields.uf.as_deref(), Some("AC"));
        assert_eq!(fields.year, Some(2011));
        assert_eq!(fields.month, Some(1));

        let zip = File::new("/", "CIHAAC1101.zip", FileInfo::file(1, Default::default()));
        assert!(ciha.format(&zip).is_none());
    }

    #[test]
    fn test_get_files() {
        let (_tmp, catalog) = mirror(&[
            "dissemin/publicos/CIHA/201101_/Dados/CIHAAC1101.dbc",
            "dissemin/publicos/CIHA/201101_/Dados/CIHAAC1102.dbc",
            "dissemin/publicos/CIHA/201101_/Dados/CIHASP1101.dbc",
        ]);
        let ciha = Ciha::new(catalog);
        let files = ciha
            .get_files(&FileQuery::new().uf("AC").year(2011).months([1, 2]))
            .unwrap();
        assert_eq!(names(&files), vec!["CIHAAC1101.dbc", "CIHAAC1102.dbc"]);
        let description = ciha.describe(&files[1]).unwrap();
        assert_eq!(description.month.as_deref(), Some("Fevereiro"));
        assert!(ciha.get_files(&FileQuery::new().group("RD")).is_err());
    }
}
