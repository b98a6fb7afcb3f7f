use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the local cache directory
pub const CACHE_PATH_ENV: &str = "PYSUS_CACHEPATH";
pub const DEFAULT_CACHE_DIR: &str = "pysus";
pub const DATASUS_FTP_HOST: &str = "ftp.datasus.gov.br";
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Runtime configuration shared by the catalog and the downloaders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory where downloads and converted tables are stored
    pub cache_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Resolves the cache directory from `PYSUS_CACHEPATH`, then `$HOME/pysus`,
    /// then `./pysus`
    pub fn from_env() -> Self {
        let cache_path = env::var_os(CACHE_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|home| home.join(DEFAULT_CACHE_DIR))
                    .unwrap_or_else(|| PathBuf::from(".").join(DEFAULT_CACHE_DIR))
            });
        Self::with_cache_path(cache_path)
    }

    pub fn with_cache_path(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            host: DATASUS_FTP_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
        }
    }

    /// Creates the cache directory if needed and returns it
    pub fn ensure_cache_dir(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.cache_path)?;
        Ok(&self.cache_path)
    }

    /// Resolves an optional caller-supplied directory against the cache path
    pub fn resolve_local_dir(&self, local_dir: Option<&Path>) -> PathBuf {
        local_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cache_path.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

lazy_static! {
    /// Configuration resolved once from the environment at first use
    pub static ref DEFAULT_CONFIG: Config = Config::from_env();
}

/// Utility functions for working with paths
pub mod path_utils {
    use std::path::{Path, PathBuf};

    /// Case-insensitive extension check; `ext` may carry the leading dot
    pub fn has_extension<P: AsRef<Path>>(path: P, ext: &str) -> bool {
        let wanted = ext.trim_start_matches('.');
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
    }

    /// `dir/name.partial`, used for staged writes that are renamed on success
    pub fn staging_path<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".partial");
        path.with_file_name(name)
    }

    /// Removes a file or directory, ignoring paths that are already gone
    pub fn remove_path<P: AsRef<Path>>(path: P) {
        let path = path.as_ref();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
