use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::io::AsyncReadExt;
use lazy_static::lazy_static;
use regex::Regex;
use suppaftp::{FtpError, Status};

use super::directory::{Directory, FileSystemProvider, ListingEntry};
use super::file_info::FileInfo;
use super::ftp_connection_manager::FtpConnectionManager;
use super::utils::Config;
use crate::errors::{DatasusError, DatasusResult};

lazy_static! {
    /// `MM-DD-YY  HH:MM(AM|PM)  (<DIR>|size)  name`, as printed by the IIS server
    static ref WINDOWS_FTP_REGEX: Regex = Regex::new(
        r"^(\d{2}-\d{2}-\d{2})\s+(\d{1,2}:\d{2}[AP]M)\s+(?:(<DIR>)|(\d+))\s+(.+)$"
    )
    .expect("valid LIST regex");
}

const LIST_TIME_FORMAT: &str = "%m-%d-%y %I:%M%p";

/// Parses one IIS-style `LIST` line.
///
/// Returns `None` for blank lines, `.`/`..`, and anything that does not
/// follow the IIS layout.
pub fn parse_list_line(line: &str) -> Option<ListingEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let captures = WINDOWS_FTP_REGEX.captures(line)?;
    let date_str = captures.get(1)?.as_str();
    let time_str = captures.get(2)?.as_str();
    let is_dir = captures.get(3).is_some();
    let name = captures.get(5)?.as_str().trim().to_string();

    if name == "." || name == ".." {
        return None;
    }

    let modify =
        NaiveDateTime::parse_from_str(&format!("{} {}", date_str, time_str), LIST_TIME_FORMAT)
            .ok()?;

    if is_dir {
        Some(ListingEntry::Directory { name, modify })
    } else {
        let size = captures.get(4)?.as_str().parse::<u64>().ok()?;
        Some(ListingEntry::File {
            name,
            info: FileInfo::file(size, modify),
        })
    }
}

/// Parses a whole listing, logging lines that do not match
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<ListingEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let line = line.as_ref();
            let parsed = parse_list_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                log::debug!("ignoring unparsable LIST line: {:?}", line);
            }
            parsed
        })
        .collect()
}

fn is_unavailable(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable)
}

fn is_access_denied(err: &FtpError) -> bool {
    match err {
        FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable => {
            String::from_utf8_lossy(&resp.body)
                .to_lowercase()
                .contains("denied")
        }
        _ => false,
    }
}

/// Maps server replies onto the crate taxonomy: 550 becomes `NotFound`
/// (or `AccessDenied`), everything else is a transport failure
fn classify_error(path: &str, err: FtpError) -> DatasusError {
    if is_access_denied(&err) {
        DatasusError::AccessDenied(path.to_string())
    } else if is_unavailable(&err) {
        DatasusError::NotFound(path.to_string())
    } else {
        DatasusError::Transport {
            path: path.to_string(),
            source: err,
        }
    }
}

/// Provider talking to the DATASUS FTP server.
///
/// Listing, probing and serial downloads use blocking connections; the
/// async retrieval opens its own connection per call.
#[derive(Debug, Clone)]
pub struct FtpFileSystemProvider {
    connection_manager: FtpConnectionManager,
}

impl FtpFileSystemProvider {
    pub fn new_datasus() -> Self {
        Self::new(FtpConnectionManager::new_datasus())
    }

    pub fn new(connection_manager: FtpConnectionManager) -> Self {
        Self { connection_manager }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(FtpConnectionManager::from_config(config))
    }
}

#[async_trait]
impl FileSystemProvider for FtpFileSystemProvider {
    fn list_directory(&self, path: &str) -> DatasusResult<Vec<ListingEntry>> {
        let started = Instant::now();
        let lines = self
            .connection_manager
            .with_connection(|ftp| {
                ftp.cwd(path)?;
                ftp.list(None)
            })
            .map_err(|e| classify_error(path, e))?;
        log::debug!(
            "LIST {} returned {} lines in {:?}",
            path,
            lines.len(),
            started.elapsed()
        );
        Ok(parse_listing(&lines))
    }

    fn exists(&self, path: &str) -> DatasusResult<bool> {
        self.connection_manager
            .with_connection(|ftp| match ftp.cwd(path) {
                Ok(()) => Ok(true),
                Err(e) if is_access_denied(&e) => Ok(true),
                Err(e) if is_unavailable(&e) => match ftp.size(path) {
                    Ok(_) => Ok(true),
                    Err(e) if is_unavailable(&e) => Ok(false),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            })
            .map_err(|e| classify_error(path, e))
    }

    fn retrieve(&self, remote_path: &str, target: &Path) -> DatasusResult<u64> {
        let (parent, basename) = Directory::split_path(remote_path);
        let mut local_file = std::fs::File::create(target)?;
        self.connection_manager
            .with_connection(|ftp| {
                ftp.cwd(&parent)?;
                ftp.retr(&basename, |reader| {
                    std::io::copy(reader, &mut local_file).map_err(FtpError::ConnectionError)
                })
            })
            .map_err(|e| classify_error(remote_path, e))
    }

    async fn retrieve_async(&self, remote_path: &str, target: &Path) -> DatasusResult<u64> {
        let (parent, basename) = Directory::split_path(remote_path);
        let buffer = self
            .connection_manager
            .with_async_connection(move |ftp| {
                Box::pin(async move {
                    ftp.cwd(&parent).await?;
                    ftp.retr(&basename, |mut data_stream| {
                        Box::pin(async move {
                            let mut file_buffer = Vec::new();
                            let mut chunk_buffer = vec![0u8; 8192];
                            loop {
                                match data_stream.read(&mut chunk_buffer).await {
                                    Ok(0) => break,
                                    Ok(n) => file_buffer.extend_from_slice(&chunk_buffer[..n]),
                                    Err(e) => return Err(FtpError::ConnectionError(e)),
                                }
                            }
                            Ok((file_buffer, data_stream))
                        })
                    })
                    .await
                })
            })
            .await
            .map_err(|e| classify_error(remote_path, e))?;
        tokio::fs::write(target, &buffer).await?;
        Ok(buffer.len() as u64)
    }

    fn provider_name(&self) -> &'static str {
        "ftp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_file_line() {
        let entry = parse_list_line("01-15-20  03:45PM             123456 DOAC1996.dbc").unwrap();
        match entry {
            ListingEntry::File { name, info } => {
                assert_eq!(name, "DOAC1996.dbc");
                assert_eq!(info.size, 123456);
                assert_eq!(info.modify.year(), 2020);
                assert_eq!(info.modify.month(), 1);
                assert_eq!(info.modify.day(), 15);
                assert_eq!(info.modify.hour(), 15);
                assert_eq!(info.modify.minute(), 45);
            }
            other => panic!("expected a file, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_dir_line() {
        let entry = parse_list_line("06-28-21  10:02AM       <DIR>          CID10").unwrap();
        match entry {
            ListingEntry::Directory { name, modify } => {
                assert_eq!(name, "CID10");
                assert_eq!(modify.hour(), 10);
            }
            other => panic!("expected a directory, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_name_with_spaces() {
        let entry = parse_list_line("03-01-19  12:00AM                 10 Leia me.pdf").unwrap();
        assert_eq!(entry.name(), "Leia me.pdf");
    }

    #[test]
    fn test_rejects_noise() {
        assert!(parse_list_line("").is_none());
        assert!(parse_list_line("total 12").is_none());
        assert!(parse_list_line("-rw-r--r-- 1 ftp ftp 120 Jan 01 00:00 x.dbc").is_none());
        assert!(parse_list_line("01-15-20  03:45PM       <DIR>          .").is_none());
        assert!(parse_list_line("13-45-20  03:45PM       <DIR>          bad").is_none());
    }

    #[test]
    fn test_parse_listing_keeps_order() {
        let lines = vec![
            "01-15-20  03:45PM                  1 B.dbc".to_string(),
            "garbage".to_string(),
            "01-15-20  03:45PM                  2 A.dbc".to_string(),
        ];
        let names: Vec<_> = parse_listing(&lines)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["B.dbc", "A.dbc"]);
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        let provider = FtpFileSystemProvider::new(FtpConnectionManager::new("127.0.0.1", 1));
        match provider.list_directory("/") {
            Err(DatasusError::Transport { path, .. }) => assert_eq!(path, "/"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
