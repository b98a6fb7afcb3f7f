use crate::errors::DatasusResult;
use crate::models::directory::FileSystemProvider;
use crate::models::file_info::{EntryKind, FileInfo, format_bytes_human};
use crate::models::ftp_strategy::FtpFileSystemProvider;
use crate::models::utils::{Config, path_utils};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fmt, hash};

/// FTP File representation.
///
/// Fields:
/// - `name`: The name of the file without the extension.
/// - `extension`: The file extension, including the dot.
/// - `basename`: The full name of the file including the extension.
/// - `path`: The full path to the file on the FTP server.
/// - `parent_path`: The directory path where the file is located on the FTP server.
/// - `info`: Metadata about the file, including size, type, and modification date.
///
/// Two files are equal when their remote paths are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    pub extension: String,
    pub basename: String,
    pub path: String,
    pub parent_path: String,
    info: FileInfo,
}

impl File {
    /// Creates a new File instance
    ///
    /// # Arguments
    /// * `path` - The directory path where the file is located
    /// * `name` - The full filename including extension
    /// * `info` - File metadata
    pub fn new(path: &str, name: &str, info: FileInfo) -> Self {
        let (file_name, extension) = match name.rfind('.') {
            Some(pos) if pos > 0 => (name[..pos].to_string(), name[pos..].to_string()),
            _ => (name.to_string(), String::new()),
        };

        let parent_path = if path.len() > 1 {
            path.trim_end_matches('/').to_string()
        } else {
            "/".to_string()
        };
        let full_path = if parent_path.ends_with('/') {
            format!("{}{}", parent_path, name)
        } else {
            format!("{}/{}", parent_path, name)
        };

        Self {
            name: file_name,
            extension,
            basename: name.to_string(),
            path: full_path,
            parent_path,
            info,
        }
    }

    /// Returns a map with human-readable file information
    ///
    /// Includes size, type, and modification date formatted for display
    pub fn info(&self) -> HashMap<String, String> {
        let mut info_map = HashMap::new();
        info_map.insert("size".to_string(), format_bytes_human(self.info.size));

        let file_type = if self.extension.is_empty() {
            "File".to_string()
        } else {
            format!("{} file", self.extension[1..].to_uppercase())
        };
        info_map.insert("type".to_string(), file_type);

        let modify = self.info.modify.format("%Y-%m-%d %I:%M%p").to_string();
        info_map.insert("modify".to_string(), modify);

        info_map
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.info
    }

    pub fn size_bytes(&self) -> u64 {
        self.info.size
    }

    pub fn modification_date(&self) -> NaiveDateTime {
        self.info.modify
    }

    pub fn kind(&self) -> EntryKind {
        self.info.kind
    }

    /// Check if the file has a specific extension (case insensitive)
    pub fn has_extension(&self, ext: &str) -> bool {
        let ext_with_dot = if ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{}", ext)
        };
        self.extension.eq_ignore_ascii_case(&ext_with_dot)
    }

    /// Where this file lands inside `local_dir`
    pub fn local_path(&self, local_dir: &Path) -> PathBuf {
        local_dir.join(&self.basename)
    }

    /// An already materialized local copy: the converted table, the
    /// decompressed DBF, or the raw download, in that order.
    pub fn cached_copy(&self, local_dir: &Path) -> Option<PathBuf> {
        let target = self.local_path(local_dir);
        [
            target.with_extension("parquet"),
            target.with_extension("dbf"),
            target.clone(),
        ]
        .into_iter()
        .find(|candidate| candidate.exists())
    }

    /// Downloads the file from the DATASUS FTP server into `local_dir`
    /// (the configured cache when `None`) over a fresh connection.
    pub fn download(&self, local_dir: Option<&Path>) -> DatasusResult<PathBuf> {
        let config = Config::default();
        let provider = FtpFileSystemProvider::from_config(&config);
        self.download_with(&provider, &config.resolve_local_dir(local_dir))
    }

    /// Concurrent-friendly counterpart of [`File::download`]
    pub async fn async_download(&self, local_dir: Option<&Path>) -> DatasusResult<PathBuf> {
        let config = Config::default();
        let provider = FtpFileSystemProvider::from_config(&config);
        self.async_download_with(&provider, &config.resolve_local_dir(local_dir))
            .await
    }

    /// Retrieves the file through `provider`, skipping the transfer if a
    /// local copy already exists. A failed transfer leaves no partial file.
    pub fn download_with(
        &self,
        provider: &dyn FileSystemProvider,
        local_dir: &Path,
    ) -> DatasusResult<PathBuf> {
        if let Some(existing) = self.cached_copy(local_dir) {
            log::debug!("{} already cached at {}", self.path, existing.display());
            return Ok(existing);
        }
        std::fs::create_dir_all(local_dir)?;
        let target = self.local_path(local_dir);
        match provider.retrieve(&self.path, &target) {
            Ok(bytes) => {
                log::info!("downloaded {} ({})", self.path, format_bytes_human(bytes));
                Ok(target)
            }
            Err(e) => {
                path_utils::remove_path(&target);
                Err(e)
            }
        }
    }

    pub async fn async_download_with(
        &self,
        provider: &dyn FileSystemProvider,
        local_dir: &Path,
    ) -> DatasusResult<PathBuf> {
        if let Some(existing) = self.cached_copy(local_dir) {
            log::debug!("{} already cached at {}", self.path, existing.display());
            return Ok(existing);
        }
        tokio::fs::create_dir_all(local_dir).await?;
        let target = self.local_path(local_dir);
        match provider.retrieve_async(&self.path, &target).await {
            Ok(bytes) => {
                log::info!("downloaded {} ({})", self.path, format_bytes_human(bytes));
                Ok(target)
            }
            Err(e) => {
                path_utils::remove_path(&target);
                Err(e)
            }
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.basename)
    }
}

impl hash::Hash for File {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for File {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::directory::LocalFileSystemProvider;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn info(size: u64) -> FileInfo {
        let modify = NaiveDate::from_ymd_opt(2019, 5, 20)
            .unwrap()
            .and_hms_opt(15, 4, 0)
            .unwrap();
        FileInfo::file(size, modify)
    }

    #[test]
    fn test_file_creation() {
        let file = File::new("/dissemin/publicos/SIM/CID10/DORES", "DOAC1996.dbc", info(1024));

        assert_eq!(file.name, "DOAC1996");
        assert_eq!(file.extension, ".dbc");
        assert_eq!(file.basename, "DOAC1996.dbc");
        assert_eq!(file.path, "/dissemin/publicos/SIM/CID10/DORES/DOAC1996.dbc");
        assert_eq!(file.parent_path, "/dissemin/publicos/SIM/CID10/DORES");
    }

    #[test]
    fn test_file_without_extension_and_root_parent() {
        let file = File::new("/", "README", info(512));

        assert_eq!(file.name, "README");
        assert_eq!(file.extension, "");
        assert_eq!(file.path, "/README");
        assert_eq!(file.parent_path, "/");
    }

    #[test]
    fn test_info_map() {
        let file = File::new("/tmp/", "DOAC1996.dbc", info(2048));
        let map = file.info();
        assert_eq!(map["size"], "2.0 KB");
        assert_eq!(map["type"], "DBC file");
        assert_eq!(map["modify"], "2019-05-20 03:04PM");
    }

    #[test]
    fn test_equality_by_path() {
        let a = File::new("/a", "X.dbc", info(1));
        let b = File::new("/a/", "X.dbc", info(2));
        let c = File::new("/b", "X.dbc", info(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.has_extension("DBC"));
    }

    #[test]
    fn test_download_with_local_provider_and_skip() {
        let mirror = TempDir::new().unwrap();
        std::fs::create_dir_all(mirror.path().join("data")).unwrap();
        std::fs::write(mirror.path().join("data/X.zip"), b"zip bytes").unwrap();
        let provider = LocalFileSystemProvider::new(mirror.path());

        let out = TempDir::new().unwrap();
        let file = File::new("/data", "X.zip", info(9));
        let path = file.download_with(&provider, out.path()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"zip bytes");

        // a second call is a no-op even after the source disappears
        std::fs::remove_file(mirror.path().join("data/X.zip")).unwrap();
        assert_eq!(file.download_with(&provider, out.path()).unwrap(), path);
    }

    #[test]
    fn test_cached_copy_prefers_table() {
        let out = TempDir::new().unwrap();
        std::fs::create_dir(out.path().join("DOAC1996.parquet")).unwrap();
        let file = File::new("/x", "DOAC1996.dbc", info(1));
        assert_eq!(
            file.cached_copy(out.path()),
            Some(out.path().join("DOAC1996.parquet"))
        );
    }

    #[test]
    fn test_failed_download_leaves_nothing() {
        let mirror = TempDir::new().unwrap();
        let provider = LocalFileSystemProvider::new(mirror.path());
        let out = TempDir::new().unwrap();
        let file = File::new("/missing", "Y.dbc", info(1));
        let err = file.download_with(&provider, out.path()).unwrap_err();
        assert!(err.is_not_found());
        assert!(!out.path().join("Y.dbc").exists());

        let err = tokio_test::block_on(file.async_download_with(&provider, out.path())).unwrap_err();
        assert!(err.is_not_found());
        assert!(!out.path().join("Y.dbc").exists());
    }

    #[tokio::test]
    async fn test_async_download_with_local_provider() {
        let mirror = TempDir::new().unwrap();
        std::fs::write(mirror.path().join("A.dbf"), b"dbf").unwrap();
        let provider = LocalFileSystemProvider::new(mirror.path());
        let out = TempDir::new().unwrap();
        let file = File::new("/", "A.dbf", info(3));
        let path = file.async_download_with(&provider, out.path()).await.unwrap();
        assert_eq!(path, out.path().join("A.dbf"));
        assert!(path.exists());
    }
}
