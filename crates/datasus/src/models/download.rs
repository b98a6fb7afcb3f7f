use crate::errors::{DatasusError, DatasusResult};
use crate::models::directory::FileSystemProvider;
use crate::models::file::File;
use crate::models::file_info::format_bytes_human;
use crate::models::local::{Table, open_local};
use crate::models::utils::{Config, path_utils};
use console::Style;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Download configuration for customizing download behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Local directory to save files to; the cache path when `None`
    pub local_dir: Option<PathBuf>,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
    /// Convert `.dbc`/`.dbf` downloads into table directories
    pub convert: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            local_dir: None,
            show_progress: false,
            convert: true,
        }
    }
}

/// What a download left in the local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalFile {
    /// A converted DBC/DBF
    Table(Table),
    /// Anything else, e.g. a `.zip` archive
    Other(PathBuf),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalFile::Table(table) => table.path(),
            LocalFile::Other(path) => path,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            LocalFile::Table(table) => Some(table),
            LocalFile::Other(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            LocalFile::Table(table) => Some(table),
            LocalFile::Other(_) => None,
        }
    }
}

/// File downloader bound to one provider.
///
/// `download` transfers files one after the other; `async_download` starts
/// one task per file, each with its own connection, and returns the results
/// in input order. Dropping the `async_download` future aborts the transfers
/// still in flight; completed files stay on disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    provider: Arc<dyn FileSystemProvider>,
    cache: Config,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(provider: Arc<dyn FileSystemProvider>, cache: Config) -> Self {
        Self {
            provider,
            cache,
            config: DownloadConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DownloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_local_dir(mut self, local_dir: Option<&Path>) -> Self {
        if let Some(dir) = local_dir {
            self.config.local_dir = Some(dir.to_path_buf());
        }
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Directory the files land in
    pub fn target_dir(&self) -> PathBuf {
        self.cache.resolve_local_dir(self.config.local_dir.as_deref())
    }

    /// Downloads a single file and converts it if it is a DBC/DBF
    pub fn download_file(&self, file: &File) -> DatasusResult<LocalFile> {
        let path = file.download_with(self.provider.as_ref(), &self.target_dir())?;
        self.materialize(path)
    }

    pub async fn download_file_async(&self, file: &File) -> DatasusResult<LocalFile> {
        let path = file
            .async_download_with(self.provider.as_ref(), &self.target_dir())
            .await?;
        let downloader = self.clone();
        tokio::task::spawn_blocking(move || downloader.materialize(path)).await?
    }

    /// Downloads `files` serially, stopping at the first failure
    pub fn download(&self, files: &[File]) -> DatasusResult<Vec<LocalFile>> {
        let started = Instant::now();
        let pb = self.progress_bar(files.len());
        let mut local_files = Vec::with_capacity(files.len());
        for file in files {
            pb.set_message(file.basename.clone());
            match self.download_file(file) {
                Ok(local) => {
                    local_files.push(local);
                    pb.inc(1);
                }
                Err(e) => {
                    pb.abandon_with_message(format!("failed on {}", file.basename));
                    return Err(e);
                }
            }
        }
        self.finish(&pb, files, started);
        Ok(local_files)
    }

    /// Downloads `files` concurrently, one task per file.
    ///
    /// Every task runs to completion; the first failure is returned once
    /// they have all settled.
    pub async fn async_download(&self, files: &[File]) -> DatasusResult<Vec<LocalFile>> {
        let started = Instant::now();
        let pb = self.progress_bar(files.len());
        let mut tasks = JoinSet::new();
        for (index, file) in files.iter().cloned().enumerate() {
            let downloader = self.clone();
            tasks.spawn(async move { (index, downloader.download_file_async(&file).await) });
        }

        let mut slots: Vec<Option<LocalFile>> = vec![None; files.len()];
        let mut first_error: Option<DatasusError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    first_error.get_or_insert(e.into());
                    continue;
                }
            };
            match result {
                Ok(local) => {
                    pb.set_message(files[index].basename.clone());
                    pb.inc(1);
                    slots[index] = Some(local);
                }
                Err(e) => {
                    log::warn!("download of {} failed: {}", files[index].path, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            pb.abandon_with_message("download failed");
            return Err(e);
        }
        self.finish(&pb, files, started);
        Ok(slots.into_iter().flatten().collect())
    }

    fn materialize(&self, path: PathBuf) -> DatasusResult<LocalFile> {
        let convertible = ["dbc", "dbf", "parquet"]
            .iter()
            .any(|ext| path_utils::has_extension(&path, ext));
        if self.config.convert && convertible {
            Ok(LocalFile::Table(open_local(&path)?))
        } else {
            Ok(LocalFile::Other(path))
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.yellow} [{elapsed_precise}] [{wide_bar:.magenta}] {pos:>4.blue}/{len:<4.blue} {msg:.yellow}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let pb = ProgressBar::new(len as u64).with_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    fn finish(&self, pb: &ProgressBar, files: &[File], started: Instant) {
        let total: u64 = files.iter().map(File::size_bytes).sum();
        pb.finish_and_clear();
        if self.config.show_progress {
            pb.println(format!(
                "{:>12} {} files ({}) in {}",
                Style::new().green().bold().apply_to("Downloaded"),
                files.len(),
                format_bytes_human(total),
                HumanDuration(started.elapsed())
            ));
        }
        log::info!(
            "downloaded {} files into {} in {:?}",
            files.len(),
            self.target_dir().display(),
            started.elapsed()
        );
    }
}
