//! # FTP Tasklet
//!
//! This module provides the tasklet that uploads an exported file to an FTP
//! server once it has been stored locally.
//!
//! ## Features
//!
//! - Plain FTP and explicit FTPS (`AUTH TLS`)
//! - Active and passive modes
//! - Binary transfers into a remote folder
//! - Builder pattern for easy configuration
//!
//! SFTP and SCP run over SSH and are not supported; asking for them is a
//! configuration error.
//!
//! ## Example
//!
//! ```rust,no_run
//! use csv_sql_exporter::core::step::{Step, StepBuilder, StepExecution};
//! use csv_sql_exporter::tasklet::ftp::{FtpProtocol, FtpPutTaskletBuilder};
//!
//! # fn example() -> Result<(), csv_sql_exporter::ExportError> {
//! let ftp_put_tasklet = FtpPutTaskletBuilder::new()
//!     .host("ftp.example.com")
//!     .port(21)
//!     .username("user")
//!     .password("password")
//!     .protocol(FtpProtocol::Ftps)
//!     .local_file("./out/report.csv")
//!     .remote_folder("/incoming/")
//!     .build()?;
//!
//! let step = StepBuilder::new("ftp-upload")
//!     .tasklet(&ftp_put_tasklet)
//!     .build()?;
//!
//! let mut step_execution = StepExecution::new("ftp-upload");
//! step.execute(&mut step_execution)?;
//! # Ok(())
//! # }
//! ```

use std::{
    fs::File,
    io::BufReader,
    net::TcpStream,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use log::{debug, info};
use suppaftp::{
    FtpStream, ImplFtpStream, Mode, NativeTlsConnector, NativeTlsFtpStream,
    native_tls::TlsConnector, types::FileType,
};

use crate::{
    core::step::{RepeatStatus, StepExecution, Tasklet},
    error::ExportError,
};

/// Transfer protocol requested by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtpProtocol {
    #[default]
    Ftp,
    /// FTP upgraded to TLS with `AUTH TLS`.
    Ftps,
}

impl FromStr for FtpProtocol {
    type Err = ExportError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "FTP" => Ok(FtpProtocol::Ftp),
            "FTPS" => Ok(FtpProtocol::Ftps),
            other @ ("SFTP" | "SCP") => Err(ExportError::Configuration(format!(
                "Transfer protocol {} is not supported",
                other
            ))),
            // Unknown values fall back to plain FTP.
            _ => Ok(FtpProtocol::Ftp),
        }
    }
}

/// Parses `Active` or `Passive`; anything else means passive.
pub fn parse_mode(name: &str) -> Mode {
    if name.trim().eq_ignore_ascii_case("active") {
        Mode::Active
    } else {
        Mode::Passive
    }
}

/// A tasklet for uploading a file to an FTP server.
///
/// The remote file keeps the local file name and is placed in the remote
/// folder.
pub struct FtpPutTasklet {
    /// FTP server hostname or IP address
    host: String,
    /// FTP server port (default: 21)
    port: u16,
    /// FTP username
    username: String,
    /// FTP password
    password: String,
    /// Plain or TLS protected control channel
    protocol: FtpProtocol,
    /// Local file path to upload
    local_file: PathBuf,
    /// Remote folder, ending with `/`
    remote_folder: String,
    /// Whether to use passive mode (default: true)
    passive_mode: bool,
    /// Whether to accept any TLS certificate (default: true)
    accept_invalid_certs: bool,
    /// Connection timeout
    timeout: Duration,
}

impl FtpPutTasklet {
    /// Remote path the file is uploaded to.
    pub fn remote_path(&self) -> Result<String, ExportError> {
        let file_name = self
            .local_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ExportError::Configuration(format!(
                    "Local file has no usable name: {}",
                    self.local_file.display()
                ))
            })?;

        let mut remote_folder = self.remote_folder.clone();
        if !remote_folder.ends_with('/') {
            remote_folder.push('/');
        }
        Ok(format!("{}{}", remote_folder, file_name))
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect_plain(&self) -> Result<FtpStream, ExportError> {
        FtpStream::connect(self.address()).map_err(|e| {
            ExportError::Transfer(format!("Failed to connect to FTP server: {}", e))
        })
    }

    fn connect_secure(&self) -> Result<NativeTlsFtpStream, ExportError> {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| ExportError::Configuration(format!("TLS setup failed: {}", e)))?;

        NativeTlsFtpStream::connect(self.address())
            .map_err(|e| ExportError::Transfer(format!("Failed to connect to FTP server: {}", e)))?
            .into_secure(NativeTlsConnector::from(connector), &self.host)
            .map_err(|e| ExportError::Transfer(format!("TLS negotiation failed: {}", e)))
    }

    fn upload<T>(&self, mut ftp_stream: ImplFtpStream<T>) -> Result<(), ExportError>
    where
        T: suppaftp::TlsStream,
    {
        // Login
        ftp_stream
            .login(&self.username, &self.password)
            .map_err(|e| ExportError::Transfer(format!("FTP login failed: {}", e)))?;

        // Set timeout for control channel commands
        let control: &TcpStream = ftp_stream.get_ref();
        control.set_read_timeout(Some(self.timeout))?;
        control.set_write_timeout(Some(self.timeout))?;

        // Set transfer mode
        let mode = if self.passive_mode {
            Mode::Passive
        } else {
            Mode::Active
        };
        ftp_stream.set_mode(mode);
        ftp_stream
            .transfer_type(FileType::Binary)
            .map_err(|e| ExportError::Transfer(format!("Failed to set binary mode: {}", e)))?;

        let remote_path = self.remote_path()?;
        let file = File::open(&self.local_file)?;
        let mut reader = BufReader::new(file);

        let bytes = ftp_stream
            .put_file(&remote_path, &mut reader)
            .map_err(|e| ExportError::Transfer(format!("FTP upload failed: {}", e)))?;
        debug!("{} bytes sent", bytes);

        // Disconnect
        let _ = ftp_stream.quit();

        info!(
            "Upload of {} succeeded",
            self.local_file.display()
        );
        info!(
            "File Uploaded to {} to {}",
            self.host, remote_path
        );

        Ok(())
    }
}

impl Tasklet for FtpPutTasklet {
    fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, ExportError> {
        if !self.local_file.is_file() {
            return Err(ExportError::Configuration(format!(
                "The File at {} Could Not Be Found",
                self.local_file.display()
            )));
        }

        info!("Uploading File to {}", self.host);
        debug!(
            "Starting FTP PUT: {} -> {}:{}{}",
            self.local_file.display(),
            self.host,
            self.port,
            self.remote_folder
        );

        match self.protocol {
            FtpProtocol::Ftp => self.upload(self.connect_plain()?)?,
            FtpProtocol::Ftps => self.upload(self.connect_secure()?)?,
        }

        Ok(RepeatStatus::Finished)
    }
}

/// Builder for creating FtpPutTasklet instances with a fluent interface.
pub struct FtpPutTaskletBuilder {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    protocol: FtpProtocol,
    local_file: Option<PathBuf>,
    remote_folder: String,
    passive_mode: bool,
    accept_invalid_certs: bool,
    timeout: Duration,
}

impl Default for FtpPutTaskletBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpPutTaskletBuilder {
    /// Creates a new FtpPutTaskletBuilder with default settings.
    pub fn new() -> Self {
        Self {
            host: None,
            port: 21,
            username: None,
            password: None,
            protocol: FtpProtocol::Ftp,
            local_file: None,
            remote_folder: "/".to_string(),
            passive_mode: true,
            accept_invalid_certs: true,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the FTP server hostname or IP address.
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the FTP server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the FTP username.
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the FTP password.
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn protocol(mut self, protocol: FtpProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the local file path to upload.
    pub fn local_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.local_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the remote folder on the FTP server.
    pub fn remote_folder<S: Into<String>>(mut self, path: S) -> Self {
        self.remote_folder = path.into();
        self
    }

    /// Sets whether to use passive mode.
    pub fn passive_mode(mut self, passive: bool) -> Self {
        self.passive_mode = passive;
        self
    }

    /// Sets whether any server certificate is accepted over FTPS.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Sets the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the FtpPutTasklet instance.
    pub fn build(self) -> Result<FtpPutTasklet, ExportError> {
        let host = self
            .host
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ExportError::Configuration("FTP host is required".to_string()))?;
        let username = self
            .username
            .ok_or_else(|| ExportError::Configuration("FTP username is required".to_string()))?;
        let password = self
            .password
            .ok_or_else(|| ExportError::Configuration("FTP password is required".to_string()))?;
        let local_file = self
            .local_file
            .ok_or_else(|| ExportError::Configuration("Local file path is required".to_string()))?;

        Ok(FtpPutTasklet {
            host,
            port: self.port,
            username,
            password,
            protocol: self.protocol,
            local_file,
            remote_folder: self.remote_folder,
            passive_mode: self.passive_mode,
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: self.timeout,
        })
    }
}
