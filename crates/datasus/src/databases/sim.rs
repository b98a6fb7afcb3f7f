use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::{DatasusError, DatasusResult};
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::group_info::{SIM_GROUPS, find_by_name, find_group};
use crate::models::regex_patterns::FileNameGrammar;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &[
    "/dissemin/publicos/SIM/CID10/DORES",
    "/dissemin/publicos/SIM/CID9/DORES",
];

/// Mortality records (Sistema de Informação sobre Mortalidade).
///
/// Files are `DO{UF}{YYYY}` under `CID10` and `DOR{UF}{YY}` under `CID9`.
/// Groups are queried by ICD revision (`CID10`, `CID9`) or by prefix.
#[derive(Debug)]
pub struct Sim {
    core: DatabaseCore,
}

impl Sim {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }

    /// Storage prefix for an alias or prefix, if known
    fn resolve_group(group: &str) -> Option<&'static str> {
        find_by_name(SIM_GROUPS, group)
            .or_else(|| find_group(SIM_GROUPS, group))
            .map(|g| g.code)
    }
}

impl Database for Sim {
    fn name(&self) -> &'static str {
        "SIM"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::SIM
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !(file.has_extension("dbc") || file.has_extension("dbf")) {
            return None;
        }
        FileNameGrammar::SimCid10
            .parse(&file.name)
            .or_else(|| FileNameGrammar::SimCid9.parse(&file.name))
            .map(FileFields::from)
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        Some(Description::of(file).with_fields(&fields, Some(SIM_GROUPS)))
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&["groups", "ufs", "years"])?;
        let unknown: Vec<&String> = query
            .groups
            .iter()
            .filter(|g| Self::resolve_group(g).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(DatasusError::validation("group", unknown.into_iter().cloned()));
        }
        let mut filter = Filter::from_query(query, &[])?;
        filter.groups = query
            .groups
            .iter()
            .filter_map(|g| Self::resolve_group(g))
            .map(str::to_string)
            .collect();

        self.ensure_loaded()?;
        Ok(select_files(self, &filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::test_support::{mirror, names};

    fn sim() -> (tempfile::TempDir, Sim) {
        let (tmp, catalog) = mirror(&[
            "dissemin/publicos/SIM/CID10/DORES/DOAC1996.dbc",
            "dissemin/publicos/SIM/CID10/DORES/DOAC1997.dbc",
            "dissemin/publicos/SIM/CID10/DORES/DOSP1996.dbc",
            "dissemin/publicos/SIM/CID10/DORES/DOEXT96.dbc",
            "dissemin/publicos/SIM/CID9/DORES/DORAC95.dbc",
            "dissemin/publicos/SIM/CID9/DORES/DORAC96.dbc",
        ]);
        (tmp, Sim::new(catalog))
    }

    #[test]
    fn test_get_files_by_alias() {
        let (_tmp, sim) = sim();
        let files = sim
            .get_files(&FileQuery::new().group("CID10").uf("AC").year(1996))
            .unwrap();
        assert_eq!(names(&files), vec!["DOAC1996.dbc"]);

        let by_prefix = sim
            .get_files(&FileQuery::new().group("dor").uf("ac").year(95))
            .unwrap();
        assert_eq!(names(&by_prefix), vec!["DORAC95.dbc"]);
    }

    #[test]
    fn test_wildcards() {
        let (_tmp, sim) = sim();
        let files = sim.get_files(&FileQuery::new().year(1996)).unwrap();
        assert_eq!(names(&files), vec!["DOAC1996.dbc", "DOSP1996.dbc", "DORAC96.dbc"]);
    }

    #[test]
    fn test_describe() {
        let (_tmp, sim) = sim();
        sim.load().unwrap();
        let file = sim
            .files()
            .into_iter()
            .find(|f| f.basename == "DOAC1996.dbc")
            .unwrap();
        let description = sim.describe(&file).unwrap();
        assert_eq!(description.name, "DOAC1996.dbc");
        assert_eq!(description.uf.as_deref(), Some("Acre"));
        assert_eq!(description.year, Some(1996));
        assert_eq!(description.group.as_deref(), Some("CID10"));
        assert_eq!(description.size, 4);
    }

    #[test]
    fn test_unknown_values_fail_before_listing() {
        let (_tmp, sim) = sim();
        let err = sim
            .get_files(&FileQuery::new().groups(["CID11", "CID10", "XX"]))
            .unwrap_err();
        match err {
            DatasusError::Validation { field, values } => {
                assert_eq!(field, "group");
                assert_eq!(values, vec!["CID11", "XX"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!sim.core().is_loaded());
        assert!(sim.get_files(&FileQuery::new().month(1)).is_err());
    }

    #[test]
    fn test_unrecognized_files_are_surfaced() {
        let (_tmp, sim) = sim();
        sim.load().unwrap();
        assert_eq!(names(&sim.unrecognized_files()), vec!["DOEXT96.dbc"]);
        for file in sim.files() {
            if let Some(fields) = sim.format(&file) {
                assert!(find_group(SIM_GROUPS, fields.group.as_deref().unwrap()).is_some());
            }
        }
    }
}
