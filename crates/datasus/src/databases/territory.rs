use super::{Database, DatabaseCore, Description, FileFields, FileQuery, Filter, select_files};
use crate::errors::DatasusResult;
use crate::models::directory::FtpCatalog;
use crate::models::file::File;
use crate::models::subsystem::{self, DatabaseMetadata};

const PATHS: &[&str] = &["/territorio/tabelas", "/territorio/mapas"];

/// Territorial tables and maps, published as `.zip` archives
#[derive(Debug)]
pub struct Territory {
    core: DatabaseCore,
}

impl Territory {
    pub fn new(catalog: FtpCatalog) -> Self {
        Self {
            core: DatabaseCore::new(catalog, PATHS),
        }
    }

    pub fn datasus() -> Self {
        Self::new(FtpCatalog::global())
    }
}

impl Database for Territory {
    fn name(&self) -> &'static str {
        "Territory"
    }

    fn metadata(&self) -> &'static DatabaseMetadata {
        &subsystem::TERRITORY
    }

    fn core(&self) -> &DatabaseCore {
        &self.core
    }

    fn format(&self, file: &File) -> Option<FileFields> {
        if !file.has_extension("zip") {
            return None;
        }
        Some(FileFields {
            source: file.parent_path.rsplit('/').next().map(str::to_string),
            ..FileFields::default()
        })
    }

    fn describe(&self, file: &File) -> Option<Description> {
        let fields = self.format(file)?;
        let mut description = Description::of(file);
        description.source = fields.source;
        Some(description)
    }

    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>> {
        query.reject_unsupported(&[])?;
        self.ensure_loaded()?;
        Ok(select_files(self, &Filter::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::test_support::{mirror, names};

    #[test]
    fn test_get_files_lists_archives() {
        let (_tmp, catalog) = mirror(&[
            "territorio/tabelas/base_territorial.zip",
            "territorio/tabelas/leiame.txt",
            "territorio/mapas/mapas_2013.ZIP",
        ]);
        let territory = Territory::new(catalog);
        let files = territory.get_files(&FileQuery::new()).unwrap();
        assert_eq!(names(&files), vec!["base_territorial.zip", "mapas_2013.ZIP"]);

        let description = territory.describe(&files[1]).unwrap();
        assert_eq!(description.source.as_deref(), Some("mapas"));
        assert_eq!(description.size, 4);
        assert!(territory.get_files(&FileQuery::new().year(2013)).is_err());
    }
}
