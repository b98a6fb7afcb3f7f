//! Adapters over the DATASUS databases.
//!
//! Every adapter owns a [`DatabaseCore`] (its root directories plus the
//! content loaded from them) and knows its file-name grammar. Queries are
//! validated against the adapter's enumerations before any listing happens.

pub mod ciha;
pub mod cnes;
pub mod ibge;
pub mod pni;
pub mod sia;
pub mod sih;
pub mod sim;
pub mod sinan;
pub mod sinasc;
pub mod territory;

pub use ciha::Ciha;
pub use cnes::Cnes;
pub use ibge::IbgeDatasus;
pub use pni::Pni;
pub use sia::Sia;
pub use sih::Sih;
pub use sim::Sim;
pub use sinan::{Sinan, SinanStage};
pub use sinasc::Sinasc;
pub use territory::Territory;

use crate::errors::{DatasusError, DatasusResult};
use crate::models::date_utils::{get_month, parse_months, parse_years};
use crate::models::directory::{Directory, DirectoryEntry, FtpCatalog};
use crate::models::download::{Downloader, LocalFile};
use crate::models::file::File;
use crate::models::geo_utils::{parse_ufs_with, uf_name};
use crate::models::group_info::{GroupTable, group_name};
use crate::models::regex_patterns::NameParts;
use crate::models::subsystem::DatabaseMetadata;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Filters accepted by [`Database::get_files`]. Empty dimensions match
/// everything; adapters reject the dimensions they do not know.
///
/// # Example
/// ```rust
/// use datasus::databases::FileQuery;
///
/// let query = FileQuery::new().group("CID10").uf("AC").year(1996);
/// assert_eq!(query.ufs, vec!["AC"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQuery {
    pub groups: Vec<String>,
    pub ufs: Vec<String>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub diseases: Vec<String>,
    pub source: Option<String>,
    pub stage: Option<SinanStage>,
}

impl FileQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn uf(mut self, uf: impl Into<String>) -> Self {
        self.ufs.push(uf.into());
        self
    }

    pub fn ufs<I, S>(mut self, ufs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ufs.extend(ufs.into_iter().map(Into::into));
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.years.push(year);
        self
    }

    pub fn years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years.extend(years);
        self
    }

    pub fn month(mut self, month: u32) -> Self {
        self.months.push(month);
        self
    }

    pub fn months(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.months.extend(months);
        self
    }

    pub fn disease(mut self, disease: impl Into<String>) -> Self {
        self.diseases.push(disease.into());
        self
    }

    pub fn diseases<I, S>(mut self, diseases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diseases.extend(diseases.into_iter().map(Into::into));
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn stage(mut self, stage: SinanStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Fails when a dimension the adapter does not filter on is set
    pub(crate) fn reject_unsupported(&self, supported: &[&str]) -> DatasusResult<()> {
        let set = [
            ("groups", !self.groups.is_empty()),
            ("ufs", !self.ufs.is_empty()),
            ("years", !self.years.is_empty()),
            ("months", !self.months.is_empty()),
            ("diseases", !self.diseases.is_empty()),
            ("source", self.source.is_some()),
            ("stage", self.stage.is_some()),
        ];
        let unsupported: Vec<&str> = set
            .iter()
            .filter(|(name, present)| *present && !supported.contains(name))
            .map(|(name, _)| *name)
            .collect();
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(DatasusError::validation("filter", unsupported))
        }
    }
}

/// Semantic components of a file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileFields {
    pub group: Option<String>,
    pub uf: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub part: Option<char>,
    pub disease: Option<String>,
    pub stage: Option<SinanStage>,
    pub source: Option<String>,
}

impl From<NameParts> for FileFields {
    fn from(parts: NameParts) -> Self {
        Self {
            group: Some(parts.prefix),
            uf: parts.uf,
            year: parts.year,
            month: parts.month,
            part: parts.part,
            ..Self::default()
        }
    }
}

/// Human-readable record of a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<SinanStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub size: u64,
    pub last_update: NaiveDateTime,
}

impl Description {
    /// Name, size and timestamp of `file`, every other field empty
    pub fn of(file: &File) -> Self {
        Self {
            name: file.basename.clone(),
            group: None,
            uf: None,
            year: None,
            month: None,
            part: None,
            disease: None,
            stage: None,
            source: None,
            size: file.size_bytes(),
            last_update: file.modification_date(),
        }
    }

    /// Fills the common fields from parsed components: the group through
    /// `groups`, the state name (falling back to the raw code) and the
    /// month name
    pub(crate) fn with_fields(mut self, fields: &FileFields, groups: Option<GroupTable>) -> Self {
        self.group = match (groups, fields.group.as_deref()) {
            (Some(table), Some(code)) => group_name(table, code).map(str::to_string),
            _ => None,
        };
        self.uf = fields
            .uf
            .as_deref()
            .map(|uf| uf_name(uf).map(str::to_string).unwrap_or_else(|| uf.to_string()));
        self.year = fields.year;
        self.month = fields
            .month
            .and_then(|m| get_month(m).ok())
            .map(str::to_string);
        self.part = fields.part;
        self
    }
}

/// Normalized filter values; an empty dimension accepts everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Filter {
    pub groups: Vec<String>,
    pub ufs: Vec<String>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub diseases: Vec<String>,
    pub stage: Option<SinanStage>,
}

impl Filter {
    /// Validates the UF, year and month dimensions of `query`
    pub fn from_query(query: &FileQuery, extra_ufs: &[&str]) -> DatasusResult<Self> {
        Ok(Self {
            ufs: parse_ufs_with(&query.ufs, extra_ufs)?,
            years: parse_years(&query.years)?,
            months: parse_months(&query.months)?,
            stage: query.stage,
            ..Self::default()
        })
    }

    pub fn accepts(&self, fields: &FileFields) -> bool {
        fn within<T: PartialEq>(wanted: &[T], value: Option<&T>) -> bool {
            wanted.is_empty() || value.is_some_and(|v| wanted.contains(v))
        }
        within(&self.groups, fields.group.as_ref())
            && within(&self.ufs, fields.uf.as_ref())
            && within(&self.years, fields.year.as_ref())
            && within(&self.months, fields.month.as_ref())
            && within(&self.diseases, fields.disease.as_ref())
            && self.stage.is_none_or(|stage| fields.stage == Some(stage))
    }
}

#[derive(Debug, Default)]
struct Content {
    loaded: bool,
    entries: Vec<DirectoryEntry>,
    seen: HashSet<String>,
}

/// State shared by every adapter: the catalog, the root directories and
/// the entries loaded from them in listing order
pub struct DatabaseCore {
    catalog: FtpCatalog,
    paths: Vec<Arc<Directory>>,
    content: RwLock<Content>,
}

impl DatabaseCore {
    pub fn new(catalog: FtpCatalog, paths: &[&str]) -> Self {
        let paths = paths.iter().map(|path| catalog.directory(path)).collect();
        Self {
            catalog,
            paths,
            content: RwLock::new(Content::default()),
        }
    }

    pub fn catalog(&self) -> &FtpCatalog {
        &self.catalog
    }

    pub fn paths(&self) -> &[Arc<Directory>] {
        &self.paths
    }

    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Lists `directories` and appends their entries; an entry already
    /// present (same path) is kept once
    pub fn load_directories(&self, directories: &[Arc<Directory>]) -> DatasusResult<()> {
        for directory in directories {
            let entries = directory.content()?;
            let mut content = self.write();
            for entry in entries {
                if content.seen.insert(entry.path().to_string()) {
                    content.entries.push(entry);
                }
            }
        }
        self.write().loaded = true;
        Ok(())
    }

    /// Loaded entries in listing order
    pub fn entries(&self) -> Vec<DirectoryEntry> {
        self.read().entries.clone()
    }

    pub fn clear(&self) {
        *self.write() = Content::default();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Content> {
        self.content.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Content> {
        self.content.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DatabaseCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self.paths.iter().map(|p| p.path.as_str()).collect();
        f.debug_struct("DatabaseCore")
            .field("paths", &paths)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Capabilities shared by every DATASUS adapter
#[async_trait]
pub trait Database: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn metadata(&self) -> &'static DatabaseMetadata;

    fn core(&self) -> &DatabaseCore;

    /// Parses a file name; `None` when it does not follow the adapter grammar
    fn format(&self, file: &File) -> Option<FileFields>;

    /// Describes a file; `None` when it does not follow the adapter grammar
    fn describe(&self, file: &File) -> Option<Description>;

    /// Files matching `query`, loading the content first if needed
    fn get_files(&self, query: &FileQuery) -> DatasusResult<Vec<File>>;

    /// Names the server publishes but that are not data files
    fn ignored_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn paths(&self) -> &[Arc<Directory>] {
        self.core().paths()
    }

    /// Populates the content from the root directories
    fn load(&self) -> DatasusResult<&Self>
    where
        Self: Sized,
    {
        self.load_paths()?;
        Ok(self)
    }

    fn load_paths(&self) -> DatasusResult<()> {
        self.core().load_directories(self.paths())
    }

    /// Adds arbitrary directories to the content
    fn load_directories(&self, directories: &[Arc<Directory>]) -> DatasusResult<()> {
        self.core().load_directories(directories)
    }

    fn ensure_loaded(&self) -> DatasusResult<()> {
        if self.core().is_loaded() {
            Ok(())
        } else {
            self.load_paths()
        }
    }

    /// Loaded entries sorted by name
    fn content(&self) -> Vec<DirectoryEntry> {
        let mut entries = self.core().entries();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    /// Loaded files sorted by name
    fn files(&self) -> Vec<File> {
        self.content()
            .into_iter()
            .filter_map(|entry| entry.as_file().cloned())
            .collect()
    }

    /// Loaded files whose names the adapter cannot parse
    fn unrecognized_files(&self) -> Vec<File> {
        let ignored = self.ignored_names();
        self.files()
            .into_iter()
            .filter(|file| !ignored.iter().any(|name| file.name.eq_ignore_ascii_case(name)))
            .filter(|file| self.format(file).is_none())
            .inspect(|file| log::warn!("{}: unrecognized file name {}", self.name(), file.path))
            .collect()
    }

    fn downloader(&self) -> Downloader {
        let catalog = self.core().catalog();
        Downloader::new(catalog.provider().clone(), catalog.config().clone())
    }

    /// Downloads `files` one after the other into `local_dir` (the cache
    /// path when `None`)
    fn download(&self, files: &[File], local_dir: Option<&Path>) -> DatasusResult<Vec<LocalFile>> {
        self.downloader().with_local_dir(local_dir).download(files)
    }

    /// Downloads `files` concurrently, one task per file
    async fn async_download(
        &self,
        files: &[File],
        local_dir: Option<&Path>,
    ) -> DatasusResult<Vec<LocalFile>> {
        self.downloader()
            .with_local_dir(local_dir)
            .async_download(files)
            .await
    }
}

/// Loaded files of `db` that parse and pass `filter`, in listing order
pub(crate) fn select_files<D: Database + ?Sized>(db: &D, filter: &Filter) -> Vec<File> {
    db.core()
        .entries()
        .into_iter()
        .filter_map(|entry| match entry {
            DirectoryEntry::File(file) => Some(file),
            DirectoryEntry::Directory(_) => None,
        })
        .filter(|file| db.format(file).is_some_and(|fields| filter.accepts(&fields)))
        .collect()
}

/// Any of the supported databases
#[derive(Debug)]
pub enum AnyDatabase {
    Ciha(Ciha),
    Cnes(Cnes),
    IbgeDatasus(IbgeDatasus),
    Pni(Pni),
    Sia(Sia),
    Sih(Sih),
    Sim(Sim),
    Sinan(Sinan),
    Sinasc(Sinasc),
    Territory(Territory),
}

pub const DATABASE_NAMES: &[&str] = &[
    "CIHA",
    "CNES",
    "IBGE-DataSUS",
    "PNI",
    "SIA",
    "SIH",
    "SIM",
    "SINAN",
    "SINASC",
    "Territory",
];

impl AnyDatabase {
    /// Builds the adapter called `name` (case insensitive)
    pub fn from_name(name: &str, catalog: FtpCatalog) -> DatasusResult<Self> {
        let database = match name.to_uppercase().as_str() {
            "CIHA" => Self::Ciha(Ciha::new(catalog)),
            "CNES" => Self::Cnes(Cnes::new(catalog)),
            "IBGE-DATASUS" | "IBGE" => Self::IbgeDatasus(IbgeDatasus::new(catalog)),
            "PNI" => Self::Pni(Pni::new(catalog)),
            "SIA" => Self::Sia(Sia::new(catalog)),
            "SIH" => Self::Sih(Sih::new(catalog)),
            "SIM" => Self::Sim(Sim::new(catalog)),
            "SINAN" => Self::Sinan(Sinan::new(catalog)),
            "SINASC" => Self::Sinasc(Sinasc::new(catalog)),
            "TERRITORY" => Self::Territory(Territory::new(catalog)),
            _ => return Err(DatasusError::validation("database", [name])),
        };
        Ok(database)
    }

    pub fn as_database(&self) -> &dyn Database {
        match self {
            Self::Ciha(db) => db,
            Self::Cnes(db) => db,
            Self::IbgeDatasus(db) => db,
            Self::Pni(db) => db,
            Self::Sia(db) => db,
            Self::Sih(db) => db,
            Self::Sim(db) => db,
            Self::Sinan(db) => db,
            Self::Sinasc(db) => db,
            Self::Territory(db) => db,
        }
    }

    pub fn name(&self) -> &'static str {
        self.as_database().name()
    }

    pub fn load(&self) -> DatasusResult<&Self> {
        self.as_database().load_paths()?;
        Ok(self)
    }
}

impl fmt::Display for AnyDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let db = self.as_database();
        write!(f, "{} - {}", db.name(), db.metadata().long_name)
    }
}

/// Every supported database, sharing `catalog`
pub fn list_databases(catalog: &FtpCatalog) -> Vec<AnyDatabase> {
    DATABASE_NAMES
        .iter()
        .filter_map(|name| AnyDatabase::from_name(name, catalog.clone()).ok())
        .collect()
}
