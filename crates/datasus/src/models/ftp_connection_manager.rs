use std::future::Future;
use std::pin::Pin;

use suppaftp::types::FileType;
use suppaftp::{AsyncRustlsFtpStream, FtpResult, FtpStream, Mode};

use super::utils::{Config, DATASUS_FTP_HOST, DEFAULT_FTP_PORT};

/// FTP connection lifecycle: connect, anonymous login, passive binary mode,
/// run one operation, quit.
///
/// Every call opens a fresh connection; nothing is pooled, so concurrent
/// tasks never share connection state. `quit` runs whether or not the
/// operation succeeded.
#[derive(Debug, Clone)]
pub struct FtpConnectionManager {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl FtpConnectionManager {
    pub fn new_datasus() -> Self {
        Self::new(DATASUS_FTP_HOST, DEFAULT_FTP_PORT)
    }

    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: "anonymous".to_string(),
            password: "anonymous".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.host, config.port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Opens a blocking connection ready for binary transfers
    pub fn connect(&self) -> FtpResult<FtpStream> {
        log::debug!("Creating new FTP connection to {}", self.host);
        let mut ftp = FtpStream::connect(self.address())?;
        ftp.login(&self.username, &self.password)?;
        ftp.set_mode(Mode::Passive);
        ftp.transfer_type(FileType::Binary)?;
        Ok(ftp)
    }

    /// Runs `operation` on a fresh blocking connection
    pub fn with_connection<R>(
        &self,
        operation: impl FnOnce(&mut FtpStream) -> FtpResult<R>,
    ) -> FtpResult<R> {
        let mut ftp = self.connect()?;
        let result = operation(&mut ftp);
        if let Err(e) = ftp.quit() {
            log::warn!("Failed to properly close FTP connection: {}", e);
        }
        result
    }

    /// Opens an async connection ready for binary transfers
    pub async fn connect_async(&self) -> FtpResult<AsyncRustlsFtpStream> {
        log::debug!("Creating new async FTP connection to {}", self.host);
        let mut ftp = AsyncRustlsFtpStream::connect(self.address()).await?;
        ftp.login(&self.username, &self.password).await?;
        ftp.set_mode(Mode::Passive);
        ftp.transfer_type(FileType::Binary).await?;
        Ok(ftp)
    }

    /// Runs `operation` on a fresh async connection
    pub async fn with_async_connection<F, R>(&self, operation: F) -> FtpResult<R>
    where
        F: FnOnce(
            &mut AsyncRustlsFtpStream,
        ) -> Pin<Box<dyn Future<Output = FtpResult<R>> + Send + '_>>,
    {
        let mut ftp = self.connect_async().await?;
        let result = operation(&mut ftp).await;
        if let Err(e) = ftp.quit().await {
            log::warn!("Failed to properly close FTP connection: {}", e);
        }
        result
    }

    /// Verify connection without keeping it
    pub fn verify_connection(&self) -> bool {
        match self.with_connection(|ftp| ftp.pwd()) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("FTP connection verification failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::with_cache_path("/tmp");
        config.host = "127.0.0.1".to_string();
        config.port = 2121;
        let manager = FtpConnectionManager::from_config(&config);
        assert_eq!(manager.host(), "127.0.0.1");
        assert_eq!(manager.address(), "127.0.0.1:2121");
    }

    #[test]
    fn test_unreachable_server_fails_verification() {
        // port 1 on localhost is not an FTP server
        let manager = FtpConnectionManager::new("127.0.0.1", 1);
        assert!(!manager.verify_connection());
    }

    #[tokio::test]
    #[ignore] // Requires real FTP connection
    async fn test_async_connection_manager() {
        let manager = FtpConnectionManager::new_datasus();
        let dir = manager
            .with_async_connection(|ftp| {
                Box::pin(async move {
                    ftp.cwd("/dissemin/publicos").await?;
                    ftp.pwd().await
                })
            })
            .await
            .unwrap();
        assert_eq!(dir, "/dissemin/publicos");
    }
}
