use crate::errors::{DatasusError, DatasusResult};
use crate::models::file::File;
use crate::models::file_info::FileInfo;
use crate::models::ftp_strategy::FtpFileSystemProvider;
use crate::models::utils::Config;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Instant;
use std::{fmt, hash};

/// One raw line of a directory listing, before it is attached to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    Directory { name: String, modify: NaiveDateTime },
    File { name: String, info: FileInfo },
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Transport seam of the catalog.
///
/// Listing and probing are blocking; retrieval has a blocking and an async
/// form. Implementations report a missing path as `NotFound` and a refused
/// directory as `AccessDenied`.
#[async_trait]
pub trait FileSystemProvider: Send + Sync + fmt::Debug {
    /// List the contents of a directory
    fn list_directory(&self, path: &str) -> DatasusResult<Vec<ListingEntry>>;

    /// Check if a path exists
    fn exists(&self, path: &str) -> DatasusResult<bool>;

    /// Copy a remote file to `target`, returning the number of bytes written
    fn retrieve(&self, remote_path: &str, target: &Path) -> DatasusResult<u64>;

    async fn retrieve_async(&self, remote_path: &str, target: &Path) -> DatasusResult<u64>;

    /// Get the name of the file system provider
    fn provider_name(&self) -> &'static str;
}

/// Serves a local mirror laid out like the FTP tree
#[derive(Debug, Clone)]
pub struct LocalFileSystemProvider {
    root: PathBuf,
}

impl LocalFileSystemProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn map_io(path: &str, e: std::io::Error) -> DatasusError {
        match e.kind() {
            ErrorKind::NotFound => DatasusError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => DatasusError::AccessDenied(path.to_string()),
            _ => DatasusError::Io(e),
        }
    }
}

fn modified_naive(metadata: &std::fs::Metadata) -> NaiveDateTime {
    metadata
        .modified()
        .ok()
        .map(|time| DateTime::<Utc>::from(time).naive_utc())
        .unwrap_or_default()
}

#[async_trait]
impl FileSystemProvider for LocalFileSystemProvider {
    fn list_directory(&self, path: &str) -> DatasusResult<Vec<ListingEntry>> {
        let local = self.resolve(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&local).map_err(|e| Self::map_io(path, e))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                entries.push(ListingEntry::Directory {
                    name,
                    modify: modified_naive(&metadata),
                });
            } else {
                entries.push(ListingEntry::File {
                    name,
                    info: FileInfo::file(metadata.len(), modified_naive(&metadata)),
                });
            }
        }
        // read_dir order is platform dependent
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entries)
    }

    fn exists(&self, path: &str) -> DatasusResult<bool> {
        Ok(self.resolve(path).exists())
    }

    fn retrieve(&self, remote_path: &str, target: &Path) -> DatasusResult<u64> {
        let source = self.resolve(remote_path);
        if !source.is_file() {
            return Err(DatasusError::NotFound(remote_path.to_string()));
        }
        std::fs::copy(&source, target).map_err(|e| Self::map_io(remote_path, e))
    }

    async fn retrieve_async(&self, remote_path: &str, target: &Path) -> DatasusResult<u64> {
        let source = self.resolve(remote_path);
        if !tokio::fs::metadata(&source).await.is_ok_and(|m| m.is_file()) {
            return Err(DatasusError::NotFound(remote_path.to_string()));
        }
        tokio::fs::copy(&source, target)
            .await
            .map_err(|e| Self::map_io(remote_path, e))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

/// A child of a directory: either a file or another directory
#[derive(Debug, Clone)]
pub enum DirectoryEntry {
    File(File),
    Directory(Arc<Directory>),
}

impl DirectoryEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => &file.basename,
            Self::Directory(dir) => &dir.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::File(file) => &file.path,
            Self::Directory(dir) => &dir.path,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Self::File(file) => Some(file),
            Self::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&Arc<Directory>> {
        match self {
            Self::File(_) => None,
            Self::Directory(dir) => Some(dir),
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    loaded: bool,
    opaque: bool,
    children: Vec<DirectoryEntry>,
}

/// A node of the remote tree.
///
/// Directories are unique per path within a catalog: asking the catalog for
/// the same path twice yields the same `Arc`. Content is listed lazily on
/// first access and kept until [`Directory::reload`].
pub struct Directory {
    /// The normalized path of the directory
    pub path: String,
    /// The last path segment (`/` for the root)
    pub name: String,
    parent: Weak<Directory>,
    catalog: Weak<CatalogInner>,
    provider: Arc<dyn FileSystemProvider>,
    state: RwLock<DirectoryState>,
}

impl Directory {
    /// Normalizes the given path
    pub fn normalize_path(path: &str) -> String {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        format!("/{}", segments.join("/"))
    }

    /// Splits a path into parent path and name
    pub fn split_path(path: &str) -> (String, String) {
        let normalized = Self::normalize_path(path);
        if normalized == "/" {
            return ("/".to_string(), "/".to_string());
        }
        match normalized.rfind('/') {
            Some(0) => ("/".to_string(), normalized[1..].to_string()),
            Some(pos) => (normalized[..pos].to_string(), normalized[pos + 1..].to_string()),
            None => ("/".to_string(), normalized),
        }
    }

    /// Returns the registered child directory `name` of `parent`,
    /// creating and registering it if needed. Never touches the network.
    pub fn child(parent: &Arc<Directory>, name: &str) -> Arc<Directory> {
        let path = Self::normalize_path(&format!("{}/{}", parent.path, name));
        let build = |path: String| {
            let (_, name) = Self::split_path(&path);
            Arc::new(Directory {
                path,
                name,
                parent: Arc::downgrade(parent),
                catalog: parent.catalog.clone(),
                provider: parent.provider.clone(),
                state: RwLock::new(DirectoryState::default()),
            })
        };
        match parent.catalog.upgrade() {
            Some(catalog) => {
                let mut directories = catalog.lock_directories();
                directories
                    .entry(path.clone())
                    .or_insert_with(|| build(path))
                    .clone()
            }
            None => build(path),
        }
    }

    /// Parent directory; the root is its own parent
    pub fn parent(self: &Arc<Self>) -> Arc<Directory> {
        self.parent.upgrade().unwrap_or_else(|| self.clone())
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().loaded
    }

    /// True when the server refused to list this directory
    pub fn is_opaque(&self) -> bool {
        self.read_state().opaque
    }

    /// Asks the transport whether this path exists
    pub fn verify(&self) -> DatasusResult<bool> {
        self.provider.exists(&self.path)
    }

    /// Returns the content of the directory, loading it if necessary
    pub fn content(self: &Arc<Self>) -> DatasusResult<Vec<DirectoryEntry>> {
        if !self.is_loaded() {
            self.load()?;
        }
        Ok(self.read_state().children.clone())
    }

    /// Lists the directory and merges the result into the cached children.
    ///
    /// A refused directory becomes an empty, loaded leaf. A `.dbf` whose
    /// `.dbc` sibling exists is left out.
    pub fn load(self: &Arc<Self>) -> DatasusResult<()> {
        let started = Instant::now();
        let listing = match self.provider.list_directory(&self.path) {
            Ok(listing) => listing,
            Err(DatasusError::AccessDenied(_)) => {
                log::warn!("access denied listing {}, treating it as empty", self.path);
                let mut state = self.write_state();
                state.loaded = true;
                state.opaque = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let entries = self.build_entries(listing);
        let count = entries.len();
        let mut state = self.write_state();
        for entry in entries {
            match state.children.iter().position(|c| c.name() == entry.name()) {
                Some(pos) => state.children[pos] = entry,
                None => state.children.push(entry),
            }
        }
        state.loaded = true;
        log::debug!(
            "listed {} entries in {} ({:?}, {})",
            count,
            self.path,
            started.elapsed(),
            self.provider.provider_name()
        );
        Ok(())
    }

    /// Clears the cached children and lists again
    pub fn reload(self: &Arc<Self>) -> DatasusResult<()> {
        {
            let mut state = self.write_state();
            state.children.clear();
            state.loaded = false;
            state.opaque = false;
        }
        self.load()
    }

    pub fn files(self: &Arc<Self>) -> DatasusResult<Vec<File>> {
        Ok(self
            .content()?
            .into_iter()
            .filter_map(|entry| match entry {
                DirectoryEntry::File(file) => Some(file),
                DirectoryEntry::Directory(_) => None,
            })
            .collect())
    }

    pub fn subdirectories(self: &Arc<Self>) -> DatasusResult<Vec<Arc<Directory>>> {
        Ok(self
            .content()?
            .into_iter()
            .filter_map(|entry| match entry {
                DirectoryEntry::Directory(dir) => Some(dir),
                DirectoryEntry::File(_) => None,
            })
            .collect())
    }

    fn build_entries(self: &Arc<Self>, listing: Vec<ListingEntry>) -> Vec<DirectoryEntry> {
        let dbc_stems: HashSet<String> = listing
            .iter()
            .filter_map(|entry| match entry {
                ListingEntry::File { name, .. } => stem_with_extension(name, "dbc"),
                ListingEntry::Directory { .. } => None,
            })
            .collect();

        listing
            .into_iter()
            .filter_map(|entry| match entry {
                ListingEntry::Directory { name, .. } => {
                    Some(DirectoryEntry::Directory(Directory::child(self, &name)))
                }
                ListingEntry::File { name, info } => {
                    if stem_with_extension(&name, "dbf").is_some_and(|s| dbc_stems.contains(&s)) {
                        log::debug!("skipping {} in favour of its .dbc", name);
                        return None;
                    }
                    Some(DirectoryEntry::File(File::new(&self.path, &name, info)))
                }
            })
            .collect()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Uppercase stem of `name` when its extension is `ext` (case insensitive)
fn stem_with_extension(name: &str, ext: &str) -> Option<String> {
    let (stem, found) = name.rsplit_once('.')?;
    found
        .eq_ignore_ascii_case(ext)
        .then(|| stem.to_uppercase())
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl hash::Hash for Directory {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Directory {}

pub(crate) struct CatalogInner {
    provider: Arc<dyn FileSystemProvider>,
    config: Config,
    directories: Mutex<HashMap<String, Arc<Directory>>>,
}

impl CatalogInner {
    fn lock_directories(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Directory>>> {
        self.directories.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide registry of directories, keyed by normalized path.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct FtpCatalog {
    inner: Arc<CatalogInner>,
}

static DEFAULT_CATALOG: Lazy<FtpCatalog> = Lazy::new(|| FtpCatalog::datasus(Config::default()));

impl FtpCatalog {
    /// Creates a catalog whose root is registered but not yet listed
    pub fn new(provider: Arc<dyn FileSystemProvider>, config: Config) -> Self {
        let inner = Arc::new_cyclic(|catalog: &Weak<CatalogInner>| {
            let root = Arc::new_cyclic(|root: &Weak<Directory>| Directory {
                path: "/".to_string(),
                name: "/".to_string(),
                parent: root.clone(),
                catalog: catalog.clone(),
                provider: provider.clone(),
                state: RwLock::new(DirectoryState::default()),
            });
            let mut directories = HashMap::new();
            directories.insert("/".to_string(), root);
            CatalogInner {
                provider,
                config,
                directories: Mutex::new(directories),
            }
        });
        Self { inner }
    }

    /// Catalog backed by the DATASUS FTP server described by `config`
    pub fn datasus(config: Config) -> Self {
        let provider = FtpFileSystemProvider::from_config(&config);
        Self::new(Arc::new(provider), config)
    }

    /// Catalog backed by a local mirror rooted at `root`
    pub fn local(root: impl Into<PathBuf>, config: Config) -> Self {
        Self::new(Arc::new(LocalFileSystemProvider::new(root)), config)
    }

    /// The shared DATASUS catalog configured from the environment
    pub fn global() -> Self {
        DEFAULT_CATALOG.clone()
    }

    pub fn provider(&self) -> &Arc<dyn FileSystemProvider> {
        &self.inner.provider
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn root(&self) -> Arc<Directory> {
        self.directory("/")
    }

    /// Returns the registered directory for `path`, creating every missing
    /// ancestor on the way. Never touches the network.
    pub fn directory(&self, path: &str) -> Arc<Directory> {
        let normalized = Directory::normalize_path(path);
        if let Some(existing) = self.inner.lock_directories().get(&normalized) {
            return existing.clone();
        }
        let mut current = {
            let directories = self.inner.lock_directories();
            directories.get("/").cloned()
        }
        .unwrap_or_else(|| self.rebuild_root());
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            current = Directory::child(&current, segment);
        }
        current
    }

    /// Like [`FtpCatalog::directory`], but fails with `NotFound` when the
    /// transport does not know the path
    pub fn open_directory(&self, path: &str) -> DatasusResult<Arc<Directory>> {
        let directory = self.directory(path);
        if directory.verify()? {
            Ok(directory)
        } else {
            Err(DatasusError::NotFound(directory.path.clone()))
        }
    }

    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.lock_directories().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Drops every registered directory except the root, whose content is cleared.
    ///
    /// An `Arc<Directory>` obtained before the call stays valid but is no
    /// longer registered: looking up the same path afterwards yields a new
    /// instance, and loading the old one does not update the catalog.
    pub fn clear(&self) {
        let root = self.root();
        let mut directories = self.inner.lock_directories();
        directories.retain(|path, _| path == "/");
        drop(directories);
        let mut state = root.write_state();
        state.children.clear();
        state.loaded = false;
        state.opaque = false;
    }

    fn rebuild_root(&self) -> Arc<Directory> {
        let root = Arc::new_cyclic(|root: &Weak<Directory>| Directory {
            path: "/".to_string(),
            name: "/".to_string(),
            parent: root.clone(),
            catalog: Arc::downgrade(&self.inner),
            provider: self.inner.provider.clone(),
            state: RwLock::new(DirectoryState::default()),
        });
        self.inner
            .lock_directories()
            .entry("/".to_string())
            .or_insert(root)
            .clone()
    }
}

impl fmt::Debug for FtpCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpCatalog")
            .field("provider", &self.inner.provider.provider_name())
            .field("cache_path", &self.inner.config.cache_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mirror() -> (TempDir, FtpCatalog) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("dissemin/publicos/SIM/CID10/DORES")).unwrap();
        std::fs::create_dir_all(root.join("dissemin/publicos/SIM/CID9/DORES")).unwrap();
        for name in ["DOAC1996.dbc", "DOAC1997.DBC", "DOAC1997.DBF", "DOAM1996.dbf"] {
            std::fs::write(root.join("dissemin/publicos/SIM/CID10/DORES").join(name), b"x")
                .unwrap();
        }
        let catalog = FtpCatalog::local(root, Config::with_cache_path(root.join("cache")));
        (temp_dir, catalog)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(Directory::normalize_path("/"), "/");
        assert_eq!(Directory::normalize_path(""), "/");
        assert_eq!(Directory::normalize_path("/home/user/"), "/home/user");
        assert_eq!(Directory::normalize_path("home//user"), "/home/user");
        assert_eq!(Directory::normalize_path("territorio/mapas"), "/territorio/mapas");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(Directory::split_path("/"), ("/".to_string(), "/".to_string()));
        assert_eq!(
            Directory::split_path("/home/user"),
            ("/home".to_string(), "user".to_string())
        );
        assert_eq!(Directory::split_path("/home"), ("/".to_string(), "home".to_string()));
    }

    #[test]
    fn test_registry_identity() {
        let (_tmp, catalog) = mirror();
        let a = catalog.directory("/dissemin/publicos/SIM");
        let b = catalog.directory("dissemin/publicos/SIM/");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(catalog.cached_paths().contains(&"/dissemin".to_string()));
        assert!(!a.is_loaded());
    }

    #[test]
    fn test_root_is_its_own_parent() {
        let (_tmp, catalog) = mirror();
        let root = catalog.root();
        assert!(root.is_root());
        assert!(Arc::ptr_eq(&root.parent(), &root));

        let sim = catalog.directory("/dissemin/publicos/SIM");
        assert_eq!(sim.parent().path, "/dissemin/publicos");
        assert_eq!(sim.name, "SIM");
    }

    #[test]
    fn test_load_drops_dbf_with_dbc_sibling() {
        let (_tmp, catalog) = mirror();
        let dir = catalog.directory("/dissemin/publicos/SIM/CID10/DORES");
        let names: Vec<String> = dir
            .content()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["DOAC1996.dbc", "DOAC1997.DBC", "DOAM1996.dbf"]);
        assert!(dir.is_loaded());
    }

    #[test]
    fn test_children_are_registered() {
        let (_tmp, catalog) = mirror();
        let sim = catalog.directory("/dissemin/publicos/SIM");
        let subdirs = sim.subdirectories().unwrap();
        assert_eq!(subdirs.len(), 2);
        let cid10 = catalog.directory("/dissemin/publicos/SIM/CID10");
        assert!(subdirs.iter().any(|d| Arc::ptr_eq(d, &cid10)));

        let entries = sim.content().unwrap();
        assert!(entries.iter().all(|e| e.as_directory().is_some() && e.as_file().is_none()));
    }

    #[test]
    fn test_reload_picks_up_new_files() {
        let (tmp, catalog) = mirror();
        let dir = catalog.directory("/dissemin/publicos/SIM/CID9/DORES");
        assert!(dir.files().unwrap().is_empty());

        std::fs::write(tmp.path().join("dissemin/publicos/SIM/CID9/DORES/DORAC95.dbc"), b"x")
            .unwrap();
        assert!(dir.files().unwrap().is_empty());
        dir.reload().unwrap();
        assert_eq!(dir.files().unwrap()[0].basename, "DORAC95.dbc");
    }

    #[test]
    fn test_missing_directory() {
        let (_tmp, catalog) = mirror();
        let err = catalog.open_directory("/nope").unwrap_err();
        assert!(err.is_not_found());
        let dir = catalog.directory("/nope");
        assert!(dir.load().unwrap_err().is_not_found());
    }

    #[test]
    fn test_clear_keeps_root() {
        let (_tmp, catalog) = mirror();
        catalog.directory("/dissemin/publicos").content().unwrap();
        catalog.clear();
        assert_eq!(catalog.cached_paths(), vec!["/".to_string()]);
    }

    #[test]
    fn test_clear_detaches_held_directories() {
        let (_tmp, catalog) = mirror();
        let root = catalog.directory("/");
        let before = catalog.directory("/dissemin/publicos/SIM/CID10/DORES");
        before.load().unwrap();
        catalog.clear();

        let after = catalog.directory("/dissemin/publicos/SIM/CID10/DORES");
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.is_loaded());
        assert!(!after.is_loaded());
        assert!(Arc::ptr_eq(&root, &catalog.directory("/")));
    }

    #[derive(Debug)]
    struct DenyingProvider;

    #[async_trait]
    impl FileSystemProvider for DenyingProvider {
        fn list_directory(&self, path: &str) -> DatasusResult<Vec<ListingEntry>> {
            Err(DatasusError::AccessDenied(path.to_string()))
        }
        fn exists(&self, _path: &str) -> DatasusResult<bool> {
            Ok(true)
        }
        fn retrieve(&self, remote_path: &str, _target: &Path) -> DatasusResult<u64> {
            Err(DatasusError::NotFound(remote_path.to_string()))
        }
        async fn retrieve_async(&self, remote_path: &str, _target: &Path) -> DatasusResult<u64> {
            Err(DatasusError::NotFound(remote_path.to_string()))
        }
        fn provider_name(&self) -> &'static str {
            "denying"
        }
    }

    #[test]
    fn test_access_denied_becomes_opaque_leaf() {
        let _ = env_logger::builder().is_test(true).try_init();
        let catalog = FtpCatalog::new(Arc::new(DenyingProvider), Config::with_cache_path("/tmp"));
        let dir = catalog.directory("/restricted");
        assert!(dir.content().unwrap().is_empty());
        assert!(dir.is_loaded());
        assert!(dir.is_opaque());
    }

    #[tokio::test]
    async fn test_local_provider_retrieve_async() {
        let (tmp, catalog) = mirror();
        let target = tmp.path().join("out.dbc");
        let bytes = catalog
            .provider()
            .retrieve_async("/dissemin/publicos/SIM/CID10/DORES/DOAC1996.dbc", &target)
            .await
            .unwrap();
        assert_eq!(bytes, 1);
        assert_eq!(catalog.provider().provider_name(), "local");
    }
}
