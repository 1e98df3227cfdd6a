//! JSON configuration of an export.
//!
//! The file mirrors the sections of the historical `appsettings.json`:
//! `Locale`, `DatabaseConnection`, `DatabaseTable`, `CSVFile` and
//! `FTPConnection`. Keys are PascalCase.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Deserializer};

use crate::{
    error::ExportError,
    item::csv::csv_encoder::{
        EncodingConfig, FilenameExtraction, LineTerminator, NewlineQuoting, NullHandling,
    },
    locale::Locale,
};

/// Name of the configuration file looked up next to the executable.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub database_connection: DatabaseConnectionConfig,
    #[serde(default)]
    pub database_table: DatabaseTableConfig,
    #[serde(rename = "CSVFile", default)]
    pub csv_file: CsvFileConfig,
    #[serde(rename = "FTPConnection", default)]
    pub ftp_connection: FtpConnectionConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseConnectionConfig {
    /// Full SQLx connection URL; takes precedence over the other fields.
    pub url: Option<String>,
    /// `postgres`, `mysql` or `sqlite`.
    pub driver: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseTableConfig {
    pub schema: Option<String>,
    pub table_or_view: Option<String>,
    pub stored_procedure_command: Option<String>,
    pub stored_procedure_param1_integer_name: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub stored_procedure_param1_integer_value: Option<i64>,
    pub stored_procedure_param2_integer_name: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub stored_procedure_param2_integer_value: Option<i64>,
    pub stored_procedure_param1_string_name: Option<String>,
    pub stored_procedure_param1_string_value: Option<String>,
    pub stored_procedure_param2_string_name: Option<String>,
    pub stored_procedure_param2_string_value: Option<String>,
    /// Comma separated columns the table or view is sorted on.
    pub order_by: Option<String>,
    /// Rows fetched per round trip; everything at once when absent. Only
    /// honoured together with `OrderBy`.
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsvFileConfig {
    pub folder: String,
    pub file_name: String,
    pub delimiter: String,
    pub include_headers: bool,
    pub always_wrap_in_speechmarks: bool,
    pub column_name_as_file_name: Option<String>,
    pub line_terminator: LineTerminator,
    pub null_handling: NullHandling,
    pub filename_extraction: FilenameExtraction,
    pub newline_quoting: NewlineQuoting,
}

impl Default for CsvFileConfig {
    fn default() -> Self {
        Self {
            folder: String::new(),
            file_name: String::new(),
            delimiter: ",".to_string(),
            include_headers: false,
            always_wrap_in_speechmarks: false,
            column_name_as_file_name: None,
            line_terminator: LineTerminator::default(),
            null_handling: NullHandling::default(),
            filename_extraction: FilenameExtraction::default(),
            newline_quoting: NewlineQuoting::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FtpConnectionConfig {
    pub upload_file: bool,
    /// `FTP` or `FTPS`.
    #[serde(rename = "Type")]
    pub protocol: String,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `Passive` or `Active`.
    pub mode: String,
    pub folder_path: String,
    #[serde(rename = "SSHHostKeyFingerprint")]
    pub ssh_host_key_fingerprint: Option<String>,
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            upload_file: false,
            protocol: "FTP".to_string(),
            server: String::new(),
            port: 21,
            username: String::new(),
            password: String::new(),
            mode: "Passive".to_string(),
            folder_path: String::new(),
            ssh_host_key_fingerprint: None,
        }
    }
}

impl AppConfig {
    /// Reads and parses a configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig, ExportError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| {
            ExportError::Configuration(format!("Unable to read {}: {}", path.display(), error))
        })?;
        content.parse()
    }
}

impl FromStr for AppConfig {
    type Err = ExportError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(content).map_err(|error| ExportError::Configuration(error.to_string()))
    }
}

impl CsvFileConfig {
    /// Builds the encoder settings, checking the delimiter is one character.
    pub fn encoding_config(&self, locale: Locale) -> Result<EncodingConfig, ExportError> {
        let mut chars = self.delimiter.chars();
        let delimiter = match (chars.next(), chars.next()) {
            (Some(delimiter), None) => delimiter,
            _ => {
                return Err(ExportError::Configuration(format!(
                    "Delimiter must be exactly one character, got {:?}",
                    self.delimiter
                )));
            }
        };

        let config = EncodingConfig {
            delimiter,
            include_headers: self.include_headers,
            always_quote: self.always_wrap_in_speechmarks,
            filename_column: self
                .column_name_as_file_name
                .clone()
                .filter(|name| !name.is_empty()),
            locale,
            line_terminator: self.line_terminator,
            null_handling: self.null_handling,
            filename_extraction: self.filename_extraction,
            newline_quoting: self.newline_quoting,
        };
        config.validate()?;

        Ok(config)
    }
}

impl FtpConnectionConfig {
    /// Remote folder as an absolute path ending with `/`.
    pub fn upload_folder(&self) -> String {
        let mut folder = format!("/{}", self.folder_path.trim_start_matches('/'));
        if !folder.ends_with('/') {
            folder.push('/');
        }
        folder
    }
}

#[cfg(feature = "rdbc")]
mod rdbc {
    use super::{DatabaseConnectionConfig, DatabaseTableConfig};
    use crate::{
        error::ExportError,
        item::rdbc::{Driver, QueryParam, RdbcQuery},
    };

    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|value| !value.is_empty())
    }

    impl DatabaseConnectionConfig {
        /// Database engine, taken from `Driver` or from the URL scheme.
        pub fn driver(&self) -> Result<Driver, ExportError> {
            match (non_empty(&self.url), non_empty(&self.driver)) {
                (Some(url), _) => Driver::from_url(url),
                (None, Some(driver)) => driver.parse(),
                (None, None) => Err(ExportError::Configuration(
                    "DatabaseConnection needs either Url or Driver".to_string(),
                )),
            }
        }

        /// SQLx connection URL.
        pub fn connection_url(&self) -> Result<String, ExportError> {
            if let Some(url) = non_empty(&self.url) {
                return Ok(url.to_string());
            }

            let driver = self.driver()?;
            let database = non_empty(&self.database).unwrap_or_default();

            if driver == Driver::Sqlite {
                return Ok(format!("sqlite://{}", database));
            }

            let server = non_empty(&self.server).ok_or_else(|| {
                ExportError::Configuration("DatabaseConnection Server is required".to_string())
            })?;
            let credentials = match (non_empty(&self.username), non_empty(&self.password)) {
                (Some(username), Some(password)) => format!("{}:{}@", username, password),
                (Some(username), None) => format!("{}@", username),
                _ => String::new(),
            };
            let port = self
                .port
                .or(driver.default_port())
                .map(|port| format!(":{}", port))
                .unwrap_or_default();

            Ok(format!(
                "{}://{}{}{}/{}",
                driver.scheme(),
                credentials,
                server,
                port,
                database
            ))
        }
    }

    impl DatabaseTableConfig {
        /// Whether a stored procedure is configured instead of a table.
        pub fn is_procedure(&self) -> bool {
            non_empty(&self.stored_procedure_command).is_some()
        }

        /// The statement to run against `driver`.
        pub fn query(&self, driver: Driver) -> Result<RdbcQuery, ExportError> {
            let schema = non_empty(&self.schema);

            if let Some(procedure) = non_empty(&self.stored_procedure_command) {
                return RdbcQuery::procedure(driver, schema, procedure, self.procedure_params());
            }

            let table = non_empty(&self.table_or_view).ok_or_else(|| {
                ExportError::Configuration(
                    "DatabaseTable needs either TableOrView or StoredProcedureCommand".to_string(),
                )
            })?;

            Ok(RdbcQuery::table(driver, schema, table, &self.order_columns()))
        }

        /// Non-empty `OrderBy` entries, trimmed.
        fn order_columns(&self) -> Vec<&str> {
            non_empty(&self.order_by)
                .map(|columns| {
                    columns
                        .split(',')
                        .map(str::trim)
                        .filter(|column| !column.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        }

        /// Parameters whose name is set, in declaration order.
        fn procedure_params(&self) -> Vec<QueryParam> {
            let integers = [
                (
                    &self.stored_procedure_param1_integer_name,
                    self.stored_procedure_param1_integer_value,
                ),
                (
                    &self.stored_procedure_param2_integer_name,
                    self.stored_procedure_param2_integer_value,
                ),
            ];
            let texts = [
                (
                    &self.stored_procedure_param1_string_name,
                    &self.stored_procedure_param1_string_value,
                ),
                (
                    &self.stored_procedure_param2_string_name,
                    &self.stored_procedure_param2_string_value,
                ),
            ];

            let integers = integers
                .into_iter()
                .filter(|(name, _)| non_empty(name).is_some())
                .map(|(_, value)| QueryParam::Integer(value.unwrap_or_default()));
            let texts = texts
                .into_iter()
                .filter(|(name, _)| non_empty(name).is_some())
                .map(|(_, value)| QueryParam::Text(value.clone().unwrap_or_default()));

            integers.chain(texts).collect()
        }
    }
}

/// Resolves the configuration file path.
///
/// Without an argument, `appsettings.json` next to the executable is used. A
/// relative argument is resolved against the executable's folder, an absolute
/// one is used as is.
pub fn resolve_config_path(argument: Option<&Path>) -> Result<PathBuf, ExportError> {
    let base = std::env::current_exe()?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Ok(match argument {
        Some(path) => base.join(path),
        None => base.join(DEFAULT_CONFIG_FILE),
    })
}

/// Accepts integers written either as JSON numbers or as strings.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(i64),
        Text(String),
    }

    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Number(value)) => Ok(Some(value)),
        Some(Lenient::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
