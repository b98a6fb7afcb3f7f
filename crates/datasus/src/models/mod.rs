pub mod date_utils;
pub mod dbase_utils;
pub mod directory;
pub mod download;
pub mod dtypes;
pub mod file;
pub mod file_info;
pub mod ftp_connection_manager;
pub mod ftp_strategy;
pub mod geo_utils;
pub mod group_info;
pub mod local;
pub mod regex_patterns;
pub mod subsystem;
pub mod table_writer;
pub mod utils;


pub use dbase_utils::dbc_to_dbf;
pub use directory::{Directory, DirectoryEntry, FileSystemProvider, FtpCatalog, LocalFileSystemProvider};
pub use download::{DownloadConfig, Downloader, LocalFile};
pub use file::File;
pub use file_info::{EntryKind, FileInfo, format_bytes_human};
pub use ftp_connection_manager::FtpConnectionManager;
pub use ftp_strategy::FtpFileSystemProvider;
pub use local::{Table, open_local};
pub use table_writer::dbf_to_table;
pub use utils::Config;
