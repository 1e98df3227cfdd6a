use std::{cell::RefCell, path::PathBuf, time::Instant};

use log::{error, info};

use crate::{
    core::{
        item::RowSource,
        step::{Step, StepExecution, StepStatus},
    },
    error::ExportError,
    item::csv::{
        csv_encoder::{CsvEncoder, EncodedDocument},
        csv_sink::CsvFileSink,
    },
};

/// The step that reads every row, encodes the document and stores it.
///
/// The row source is borrowed mutably for the duration of the step, hence the
/// interior mutability: steps are executed through a shared reference.
pub struct ExportStep<'a> {
    name: String,
    source: RefCell<&'a mut dyn RowSource>,
    encoder: CsvEncoder,
    sink: CsvFileSink,
    output_path: RefCell<Option<PathBuf>>,
}

impl<'a> ExportStep<'a> {
    pub fn new(
        name: &str,
        source: &'a mut dyn RowSource,
        encoder: CsvEncoder,
        sink: CsvFileSink,
    ) -> Self {
        Self {
            name: name.to_string(),
            source: RefCell::new(source),
            encoder,
            sink,
            output_path: RefCell::new(None),
        }
    }

    /// Path of the stored file, once the step has succeeded.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_path.borrow().clone()
    }

    fn encode(&self) -> Result<EncodedDocument, ExportError> {
        let mut source = self.source.borrow_mut();
        self.encoder.encode_source(&mut **source)
    }
}

impl Step for ExportStep<'_> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), ExportError> {
        let start_time = Instant::now();
        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );
        info!("Loading Data into CSV");

        let result = self.encode().and_then(|document| {
            step_execution.read_count = document.row_count;
            let path = self.sink.write(&document)?;
            step_execution.write_count = document.row_count;
            Ok(path)
        });

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(path) => {
                info!("{} rows saved to {}", step_execution.write_count, path.display());
                *self.output_path.borrow_mut() = Some(path);
                step_execution.status = StepStatus::Success;
                info!(
                    "End of step: {}, id: {}",
                    step_execution.name, step_execution.id
                );
                Ok(())
            }
            Err(err) => {
                step_execution.status = StepStatus::Failed;
                error!("Step {} failed: {}", step_execution.name, err);
                Err(err)
            }
        }
    }
}

/// Encodes everything `source` yields and stores it with `sink`.
///
/// Returns the path of the stored file.
pub fn export_to_file(
    source: &mut dyn RowSource,
    encoder: CsvEncoder,
    sink: CsvFileSink,
) -> Result<PathBuf, ExportError> {
    let step = ExportStep::new("export", source, encoder, sink);
    let mut step_execution = StepExecution::new(step.get_name());
    step.execute(&mut step_execution)?;

    step.output_path()
        .ok_or_else(|| ExportError::Step(step.get_name().to_string()))
}

/// Outcome of a complete export run.
#[derive(Debug)]
pub struct ExportOutcome {
    pub output_path: PathBuf,
    pub uploaded: bool,
}

#[cfg(all(feature = "rdbc", feature = "ftp"))]
mod run {
    use std::path::Path;

    use log::info;
    use suppaftp::Mode;

    use super::{ExportOutcome, export_to_file};
    use crate::{
        config::{AppConfig, FtpConnectionConfig},
        core::step::{Step, StepBuilder, StepExecution},
        error::ExportError,
        item::{
            csv::{csv_encoder::CsvEncoder, csv_sink::CsvFileSink},
            rdbc::RdbcRowSource,
        },
        tasklet::ftp::{FtpPutTaskletBuilder, parse_mode},
    };

    /// Runs a whole export as described by `config`: query, encode, store and,
    /// when enabled, upload.
    pub fn run_export(config: &AppConfig) -> Result<ExportOutcome, ExportError> {
        info!("Setting Locale To {}", config.locale);
        let encoder = CsvEncoder::new(config.csv_file.encoding_config(config.locale)?);
        let sink = CsvFileSink::new(&config.csv_file.folder, &config.csv_file.file_name);

        let connection = &config.database_connection;
        let table = &config.database_table;
        let driver = connection.driver()?;
        let query = table.query(driver)?;

        info!("Connecting to Database");
        if table.is_procedure() {
            info!(
                "Executing Stored Procedure {}",
                table.stored_procedure_command.as_deref().unwrap_or_default()
            );
        } else {
            info!(
                "Loading data from table {}",
                table.table_or_view.as_deref().unwrap_or_default()
            );
        }

        let output_path = {
            let mut source =
                RdbcRowSource::open(&connection.connection_url()?, query, table.page_size)?;
            info!("Connected to {} database", driver.scheme());
            export_to_file(&mut source, encoder, sink)?
        };

        let ftp = &config.ftp_connection;
        if !ftp.upload_file {
            info!("Not Uploading File to FTP as Option in Config is False");
            return Ok(ExportOutcome {
                output_path,
                uploaded: false,
            });
        }

        upload(ftp, &output_path)?;

        Ok(ExportOutcome {
            output_path,
            uploaded: true,
        })
    }

    fn upload(ftp: &FtpConnectionConfig, local_file: &Path) -> Result<(), ExportError> {
        info!("Uploading CSV File");

        let has_fingerprint = ftp
            .ssh_host_key_fingerprint
            .as_deref()
            .is_some_and(|fingerprint| !fingerprint.is_empty());

        let tasklet = FtpPutTaskletBuilder::new()
            .host(&ftp.server)
            .port(ftp.port)
            .username(&ftp.username)
            .password(&ftp.password)
            .protocol(ftp.protocol.parse()?)
            .passive_mode(!matches!(parse_mode(&ftp.mode), Mode::Active))
            .accept_invalid_certs(!has_fingerprint)
            .local_file(local_file)
            .remote_folder(ftp.upload_folder())
            .build()?;

        let step = StepBuilder::new("upload").tasklet(&tasklet).build()?;
        let mut step_execution = StepExecution::new(step.get_name());
        step.execute(&mut step_execution)
    }
}

#[cfg(all(feature = "rdbc", feature = "ftp"))]
pub use run::run_export;
