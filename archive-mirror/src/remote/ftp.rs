//! FTP binding of the remote session interface.
//!
//! `suppaftp` is a blocking client, so every call runs on the blocking
//! thread pool. The stream is moved into the worker and handed back with
//! the result; a worker that panics takes the stream with it and the
//! session reports [`TransportError::Closed`] from then on.

use super::{Connector, RemoteSession, TransportError};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

/// Map an FTP failure onto the retry classification.
///
/// 4xx replies and connection failures are transient, 550 means the path
/// does not exist, every other reply is permanent.
fn classify(err: FtpError) -> TransportError {
    match &err {
        FtpError::ConnectionError(_) => TransportError::Transient(err.to_string()),
        FtpError::UnexpectedResponse(response) => match response.status.code() {
            550 => TransportError::NotFound(err.to_string()),
            400..=499 => TransportError::Transient(err.to_string()),
            _ => TransportError::Permanent(err.to_string()),
        },
        _ => TransportError::Permanent(err.to_string()),
    }
}

/// Opens FTP sessions for one server and account.
#[derive(Clone)]
pub struct FtpConnector {
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
}

impl FtpConnector {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout(),
        }
    }
}

impl FtpConnector {
    /// Open the control connection with every socket operation bounded by
    /// the configured timeout, so a server that never sends its greeting
    /// fails the attempt instead of blocking it.
    fn open_control_socket(&self) -> Result<TcpStream, TransportError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Transient(format!("cannot resolve {}: {}", self.host, e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(tcp) => {
                    tcp.set_read_timeout(Some(self.timeout))?;
                    tcp.set_write_timeout(Some(self.timeout))?;
                    return Ok(tcp);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) => TransportError::Transient(format!("cannot connect to {}:{}: {}", self.host, self.port, e)),
            None => TransportError::Transient(format!("no address found for {}", self.host)),
        })
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        let this = self.clone();

        let stream = tokio::task::spawn_blocking(move || -> Result<FtpStream, TransportError> {
            let tcp = this.open_control_socket()?;
            let mut stream = FtpStream::connect_with_stream(tcp).map_err(classify)?;
            stream
                .login(this.username.as_str(), this.password.as_str())
                .map_err(classify)?;
            stream.transfer_type(FileType::Binary).map_err(classify)?;
            Ok(stream)
        })
        .await
        .map_err(|e| TransportError::Transient(format!("FTP connect worker failed: {}", e)))??;

        Ok(Box::new(FtpSession {
            stream: Some(stream),
        }))
    }

    fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// An open FTP control connection.
pub struct FtpSession {
    stream: Option<FtpStream>,
}

impl FtpSession {
    async fn call<T, F>(&mut self, op: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T, TransportError> + Send + 'static,
    {
        let mut stream = self.stream.take().ok_or(TransportError::Closed)?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| TransportError::Transient(format!("FTP worker failed: {}", e)))?;

        self.stream = Some(stream);
        result
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn change_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let path = path.to_string();
        self.call(move |ftp| ftp.cwd(&path).map_err(classify)).await
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let path = path.to_string();
        self.call(move |ftp| ftp.mkdir(&path).map_err(classify)).await
    }

    async fn current_dir(&mut self) -> Result<String, TransportError> {
        self.call(|ftp| ftp.pwd().map_err(classify)).await
    }

    async fn list_names(&mut self) -> Result<Vec<String>, TransportError> {
        self.call(|ftp| ftp.nlst(None).map_err(classify)).await
    }

    async fn store(&mut self, remote_name: &str, local: &Path) -> Result<u64, TransportError> {
        let remote_name = remote_name.to_string();
        let local: PathBuf = local.to_path_buf();
        self.call(move |ftp| {
            let mut reader = BufReader::new(File::open(&local)?);
            ftp.put_file(&remote_name, &mut reader).map_err(classify)
        })
        .await
    }

    async fn size(&mut self, remote_name: &str) -> Result<u64, TransportError> {
        let remote_name = remote_name.to_string();
        self.call(move |ftp| ftp.size(&remote_name).map(|s| s as u64).map_err(classify))
            .await
    }

    async fn delete(&mut self, remote_name: &str) -> Result<(), TransportError> {
        let remote_name = remote_name.to_string();
        self.call(move |ftp| ftp.rm(&remote_name).map_err(classify)).await
    }

    async fn quit(&mut self) -> Result<(), TransportError> {
        let result = self.call(|ftp| ftp.quit().map_err(classify)).await;
        self.stream = None;
        result
    }
}
