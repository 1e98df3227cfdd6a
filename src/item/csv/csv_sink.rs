use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use tempfile::Builder;

use crate::error::ExportError;

use super::csv_encoder::EncodedDocument;

/// Stores an encoded document in a folder.
///
/// The output path is fully known before anything is opened: the folder is
/// joined with the file name extracted from the data or, failing that, with
/// the configured file name. The text is written to a temporary file in the
/// same folder which is then renamed over the final path, so a failed export
/// never leaves a truncated file behind.
///
/// A replaced file keeps its permissions. A new one gets the usual
/// permissions of a newly created file, `0o666` less the process umask.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    folder: PathBuf,
    file_name: String,
}

impl CsvFileSink {
    pub fn new<P: AsRef<Path>, S: Into<String>>(folder: P, file_name: S) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            file_name: file_name.into(),
        }
    }

    /// Computes where `document` will be stored.
    pub fn resolve_path(&self, document: &EncodedDocument) -> Result<PathBuf, ExportError> {
        let file_name = match &document.extracted_filename {
            Some(extracted) => {
                if extracted.contains(['/', '\\']) || matches!(extracted.as_str(), "." | "..") {
                    return Err(ExportError::Configuration(format!(
                        "File name read from the data is not a plain file name: {}",
                        extracted
                    )));
                }
                extracted.as_str()
            }
            None => self.file_name.as_str(),
        };

        if file_name.is_empty() {
            return Err(ExportError::Configuration(
                "No output file name configured".to_string(),
            ));
        }

        Ok(self.folder.join(file_name))
    }

    /// Writes `document` and returns the path of the stored file.
    pub fn write(&self, document: &EncodedDocument) -> Result<PathBuf, ExportError> {
        let path = self.resolve_path(document)?;
        let folder = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        info!("Saving CSV file {}", path.display());

        let mut builder = Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }

        let mut file = builder.tempfile_in(folder)?;
        debug!("Writing to temporary file {}", file.path().display());
        Self::write_to(&mut file, document)?;

        if let Ok(existing) = fs::metadata(&path) {
            fs::set_permissions(file.path(), existing.permissions())?;
        }

        file.persist(&path)
            .map_err(|error| ExportError::Sink(error.to_string()))?;

        Ok(path)
    }

    /// Writes the document text to any writer and flushes it.
    pub fn write_to<W: Write>(writer: W, document: &EncodedDocument) -> Result<(), ExportError> {
        let mut writer = BufWriter::new(writer);
        writer.write_all(document.text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::CsvFileSink;
    use crate::{error::ExportError, item::csv::csv_encoder::EncodedDocument};

    fn document(text: &str, extracted_filename: Option<&str>) -> EncodedDocument {
        EncodedDocument {
            text: text.to_string(),
            extracted_filename: extracted_filename.map(str::to_string),
            row_count: 1,
        }
    }

    #[test]
    fn configured_file_name_is_used_by_default() -> Result<(), ExportError> {
        let folder = tempfile::tempdir()?;
        let sink = CsvFileSink::new(folder.path(), "export.csv");

        let path = sink.write(&document("a,b\n", None))?;

        assert_eq!(path, folder.path().join("export.csv"));
        assert_eq!(fs::read_to_string(&path)?, "a,b\n");
        Ok(())
    }

    #[test]
    fn extracted_file_name_replaces_configured_one() -> Result<(), ExportError> {
        let folder = tempfile::tempdir()?;
        let sink = CsvFileSink::new(folder.path(), "export.csv");

        let path = sink.write(&document("x\n", Some("report.csv")))?;

        assert_eq!(path, folder.path().join("report.csv"));
        assert!(!folder.path().join("export.csv").exists());
        Ok(())
    }

    #[test]
    fn existing_file_is_replaced() -> Result<(), ExportError> {
        let folder = tempfile::tempdir()?;
        fs::write(folder.path().join("export.csv"), "old content that is longer\n")?;
        let sink = CsvFileSink::new(folder.path(), "export.csv");

        let path = sink.write(&document("new\n", None))?;

        assert_eq!(fs::read_to_string(path)?, "new\n");
        Ok(())
    }

    #[test]
    fn path_separators_in_extracted_name_are_rejected() {
        let sink = CsvFileSink::new("out", "export.csv");

        for name in ["../escape.csv", "sub/dir.csv", "c:\\windows.csv", ".", ".."] {
            let result = sink.resolve_path(&document("", Some(name)));
            assert!(matches!(result, Err(ExportError::Configuration(_))));
        }
    }

    #[cfg(unix)]
    #[test]
    fn new_file_gets_default_creation_mode() -> Result<(), ExportError> {
        use std::os::unix::fs::PermissionsExt;

        let folder = tempfile::tempdir()?;
        let reference = folder.path().join("reference.csv");
        fs::write(&reference, "")?;
        let sink = CsvFileSink::new(folder.path(), "export.csv");

        let path = sink.write(&document("a\n", None))?;

        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, fs::metadata(&reference)?.permissions().mode() & 0o777);
        assert_ne!(mode & 0o044, 0);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn replaced_file_keeps_its_mode() -> Result<(), ExportError> {
        use std::os::unix::fs::PermissionsExt;

        let folder = tempfile::tempdir()?;
        let target = folder.path().join("export.csv");
        fs::write(&target, "old\n")?;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o664))?;
        let sink = CsvFileSink::new(folder.path(), "export.csv");

        let path = sink.write(&document("new\n", None))?;

        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o664);
        assert_eq!(fs::read_to_string(&path)?, "new\n");
        Ok(())
    }

    #[test]
    fn missing_file_name_is_a_configuration_error() {
        let sink = CsvFileSink::new("out", "");
        let result = sink.resolve_path(&document("", None));
        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }

    #[test]
    fn missing_folder_leaves_nothing_behind() -> Result<(), ExportError> {
        let folder = tempfile::tempdir()?;
        let missing = folder.path().join("missing");
        let sink = CsvFileSink::new(&missing, "export.csv");

        let result = sink.write(&document("a\n", None));

        assert!(matches!(result, Err(ExportError::Io(_))));
        assert!(!missing.exists());
        Ok(())
    }

    #[test]
    fn write_to_copies_the_text_verbatim() -> Result<(), ExportError> {
        let mut buffer = Vec::new();
        CsvFileSink::write_to(&mut buffer, &document("é,\"q\"\r\n", None))?;
        assert_eq!(buffer, "é,\"q\"\r\n".as_bytes());
        Ok(())
    }
}
