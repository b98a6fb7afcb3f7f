use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{SIH_GROUPS, find_group, validate_codes};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &[
    "/dissemin/publicos/SIHSUS/199201_200712/Dados",
    "/dissemin/publicos/SIHSUS/200801_/Dados",
];

/// Hospital admissions (Sistema de Informações Hospitalares), one file per
/// group, state and month
#[derive(Debug)]
pub struct Sih {
    core: DatabaseCore,
}

impl Sih {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Sih {
    fn name(&self) -> &'static str {
        "SIH"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::SIH
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        FileNameGrammar::Monthly
            .parse(&file.name)
            .filter(|parts| find_group(SIH_GROUPS, &parts.prefix).is_some())
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(SIH_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years", "months"])?;
        let filter = Filter {
            groups: validate_codes("group", SIH_GROUPS, &query.groups)?,
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

    fn sih() -> (tempfile::TempDir, Sih) {
        let (tmp, catalog) = mirror(&[
            "dissemin/publicos/SIHSUS/199201_200712/Dados/RDSP0712.dbc",
            "dissemin/publicos/SIHSUS/200801_/Dados/RDSP2001.dbc",
            "dissemin/publicos/SIHSUS/200801_/Dados/RDSP2002.dbc",
            "dissemin/publicos/SIHSUS/200801_/Dados/SPRJ2001.dbc",
            "dissemin/publicos/SIHSUS/200801_/Dados/XXRJ2001.dbc",
            "dissemin/publicos/SIHSUS/200801_/Dados/leiame.pdf",
        ]);
        (tmp, Sih::new(catalog))
    }

    #[test]
    fn test_get_files_by_group_and_period() {
        let (_tmp, sih) = sih();
        let files = sih
            .get_files(&FileQuery::new().group("rd").uf("SP").year(2020).month(1))
            .unwrap();
        assert_eq!(names(&files), vec!["RDSP2001.dbc"]);

        let all_rd = sih.get_files(&FileQuery::new().group("RD")).unwrap();
        assert_eq!(names(&all_rd), vec!["RDSP0712.dbc", "RDSP2001.dbc", "RDSP2002.dbc"]);
    }

    #[test]
    fn test_describe() {
        let (_tmp, sih) = sih();
        let files = sih.get_files(&FileQuery::new().group("SP")).unwrap();
        let description = sih.describe(&files[0]).unwrap();
        assert_eq!(description.group.as_deref(), Some("Serviços Profissionais"));
        assert_eq!(description.uf.as_deref(), Some("Rio de Janeiro"));
        assert_eq!(description.month.as_deref(), Some("Janeiro"));
        assert_eq!(description.year, Some(2020));
    }

    #[test]
    fn test_non_matching_files_have_no_description() {
        let (_tmp, sih) = sih();
        sih.load().unwrap();
        let unrecognized = sih.unrecognized_files();
        assert_eq!(names(&unrecognized), vec!["XXRJ2001.dbc", "leiame.pdf"]);
        assert!(unrecognized.iter().all(|f| sih.describe(f).is_none()));
    }

    #[test]
    fn test_invalid_month() {
        let (_tmp, sih) = sih();
        assert!(sih.get_files(&FileQuery::new().group("RD").month(13)).is_err());
        assert!(!sih.core().is_loaded());
    }
}
