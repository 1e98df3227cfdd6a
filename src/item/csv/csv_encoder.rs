use log::{debug, info};
use serde::Deserialize;

use crate::{
    core::item::{Column, Row, RowSource},
    error::ExportError,
    locale::Locale,
};

const CSV_EXTENSION: &str = ".csv";

/// Line terminator appended after the header and after every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LineTerminator {
    #[default]
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    CrLf,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
        }
    }
}

/// What to write for a database NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum NullHandling {
    /// Write nothing, not even the delimiter. A non-trailing NULL shifts the
    /// following fields one position to the left.
    #[default]
    Omit,
    /// Write an empty unquoted field, keeping every line aligned with the
    /// header.
    EmptyField,
}

/// When the file name column is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum FilenameExtraction {
    /// Only while building the header line: without headers the column is
    /// neither captured nor excluded.
    #[default]
    WithHeaders,
    /// Before the first row, whether or not a header line is written.
    Always,
}

/// Quoting of values that contained a line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum NewlineQuoting {
    /// Decide quoting before line breaks are replaced by spaces, so a value
    /// quoted only for its line break stays quoted.
    #[default]
    Preserve,
    /// Replace line breaks first, quoting only what still needs it.
    Simplify,
}

/// Settings of the delimited text encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingConfig {
    pub delimiter: char,
    pub include_headers: bool,
    pub always_quote: bool,
    pub filename_column: Option<String>,
    pub locale: Locale,
    pub line_terminator: LineTerminator,
    pub null_handling: NullHandling,
    pub filename_extraction: FilenameExtraction,
    pub newline_quoting: NewlineQuoting,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_headers: false,
            always_quote: false,
            filename_column: None,
            locale: Locale::default(),
            line_terminator: LineTerminator::default(),
            null_handling: NullHandling::default(),
            filename_extraction: FilenameExtraction::default(),
            newline_quoting: NewlineQuoting::default(),
        }
    }
}

impl EncodingConfig {
    /// Rejects delimiters that would make the output unreadable.
    pub fn validate(&self) -> Result<(), ExportError> {
        match self.delimiter {
            '"' | '\r' | '\n' => Err(ExportError::Configuration(format!(
                "Delimiter {:?} cannot be used",
                self.delimiter
            ))),
            _ => Ok(()),
        }
    }
}

/// The finished text of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedDocument {
    pub text: String,
    /// File name read from the data, always ending in `.csv`.
    pub extracted_filename: Option<String>,
    /// Number of data rows encoded, header excluded.
    pub row_count: usize,
}

/// Turns a stream of rows into delimited text.
#[derive(Debug, Clone, Default)]
pub struct CsvEncoder {
    config: EncodingConfig,
}

/// Resolved once, before the first row.
#[derive(Debug, Default)]
struct FilenameColumn {
    index: Option<usize>,
    value: Option<String>,
}

impl CsvEncoder {
    pub fn new(config: EncodingConfig) -> Self {
        Self { config }
    }

    /// Encodes every row of `rows`, in order.
    ///
    /// The header line and the file name column are resolved from the first
    /// row. An empty row stream produces an empty document without a header.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by `rows`; nothing is produced in that
    /// case.
    pub fn encode<I>(&self, columns: &[Column], rows: I) -> Result<EncodedDocument, ExportError>
    where
        I: IntoIterator<Item = Result<Row, ExportError>>,
    {
        debug!("Start encoding rows");

        let mut text = String::new();
        let mut filename_column = FilenameColumn::default();
        let mut row_count = 0;

        for row in rows {
            let row = row?;

            if row_count == 0 {
                filename_column = self.resolve_filename_column(columns, &row);
                if self.config.include_headers {
                    self.write_header(columns, filename_column.index, &mut text);
                }
            }

            self.write_row(&row, filename_column.index, &mut text);
            row_count += 1;
        }

        debug!("End encoding rows: {} rows", row_count);

        Ok(EncodedDocument {
            text,
            extracted_filename: filename_column.value.map(with_csv_extension),
            row_count,
        })
    }

    /// Drains a row source into a document.
    pub fn encode_source(&self, source: &mut dyn RowSource) -> Result<EncodedDocument, ExportError> {
        let columns = source.columns().to_vec();
        self.encode(&columns, std::iter::from_fn(|| source.read().transpose()))
    }

    fn resolve_filename_column(&self, columns: &[Column], first_row: &Row) -> FilenameColumn {
        let enabled = match self.config.filename_extraction {
            FilenameExtraction::WithHeaders => self.config.include_headers,
            FilenameExtraction::Always => true,
        };
        let Some(wanted) = self.config.filename_column.as_deref().filter(|_| enabled) else {
            return FilenameColumn::default();
        };
        let Some(index) = columns.iter().position(|column| column.name == wanted) else {
            debug!("Column '{}' not found, keeping configured file name", wanted);
            return FilenameColumn::default();
        };

        let value = first_row
            .get(index)
            .and_then(|cell| self.config.locale.format(cell))
            .filter(|value| !value.is_empty());

        match &value {
            Some(value) => info!(
                "Using Custom File Name from Table Column '{}': {}",
                wanted, value
            ),
            None => info!("Column '{}' is empty on the first row", wanted),
        }

        FilenameColumn {
            index: Some(index),
            value,
        }
    }

    fn write_header(&self, columns: &[Column], skipped: Option<usize>, out: &mut String) {
        let names: Vec<&str> = columns
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skipped)
            .map(|(_, column)| column.name.as_str())
            .collect();

        out.push_str(&names.join(&self.config.delimiter.to_string()));
        out.push_str(self.config.line_terminator.as_str());
    }

    fn write_row(&self, row: &Row, skipped: Option<usize>, out: &mut String) {
        let delimiter = self.config.delimiter;
        let mut line = String::new();

        for (index, cell) in row.iter().enumerate() {
            if Some(index) == skipped {
                continue;
            }

            if cell.is_null() {
                if self.config.null_handling == NullHandling::EmptyField {
                    line.push(delimiter);
                }
                continue;
            }

            let value = self.config.locale.format(cell).unwrap_or_default();
            line.push_str(&self.encode_field(&value));
            line.push(delimiter);
        }

        if line.ends_with(delimiter) {
            line.pop();
        }

        out.push_str(&line);
        out.push_str(self.config.line_terminator.as_str());
    }

    /// Escapes and, when needed, quotes a single non-null value.
    pub fn encode_field(&self, value: &str) -> String {
        let trimmed = value.trim();
        let value = match self.config.newline_quoting {
            NewlineQuoting::Preserve => trimmed.to_string(),
            NewlineQuoting::Simplify => replace_newlines(trimmed),
        };

        let escaped = value.replace('"', "\"\"");

        let quoted = if self.config.always_quote
            || escaped.contains(self.config.delimiter)
            || escaped.contains('"')
            || contains_newline(&escaped)
        {
            format!("\"{}\"", escaped)
        } else {
            escaped
        };

        replace_newlines(&quoted)
    }
}

fn contains_newline(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

fn replace_newlines(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn with_csv_extension(mut name: String) -> String {
    if !name.ends_with(CSV_EXTENSION) {
        name.push_str(CSV_EXTENSION);
    }
    name
}

/// Builder for [`CsvEncoder`].
#[derive(Default)]
pub struct CsvEncoderBuilder {
    config: EncodingConfig,
}

impl CsvEncoderBuilder {
    pub fn new() -> CsvEncoderBuilder {
        CsvEncoderBuilder {
            config: EncodingConfig::default(),
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> CsvEncoderBuilder {
        self.config.delimiter = delimiter;
        self
    }

    pub fn include_headers(mut self, yes: bool) -> CsvEncoderBuilder {
        self.config.include_headers = yes;
        self
    }

    pub fn always_quote(mut self, yes: bool) -> CsvEncoderBuilder {
        self.config.always_quote = yes;
        self
    }

    pub fn filename_column<S: Into<String>>(mut self, column: S) -> CsvEncoderBuilder {
        self.config.filename_column = Some(column.into());
        self
    }

    pub fn locale(mut self, locale: Locale) -> CsvEncoderBuilder {
        self.config.locale = locale;
        self
    }

    pub fn line_terminator(mut self, terminator: LineTerminator) -> CsvEncoderBuilder {
        self.config.line_terminator = terminator;
        self
    }

    pub fn null_handling(mut self, policy: NullHandling) -> CsvEncoderBuilder {
        self.config.null_handling = policy;
        self
    }

    pub fn filename_extraction(mut self, policy: FilenameExtraction) -> CsvEncoderBuilder {
        self.config.filename_extraction = policy;
        self
    }

    pub fn newline_quoting(mut self, policy: NewlineQuoting) -> CsvEncoderBuilder {
        self.config.newline_quoting = policy;
        self
    }

    pub fn build(self) -> CsvEncoder {
        CsvEncoder::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        CsvEncoderBuilder, EncodingConfig, FilenameExtraction, LineTerminator, NewlineQuoting,
        NullHandling,
    };
    use crate::{
        core::item::{CellValue, Column, Row},
        error::ExportError,
        locale::Locale,
    };

    fn rows(rows: Vec<Row>) -> impl Iterator<Item = Result<Row, ExportError>> {
        rows.into_iter().map(Ok)
    }

    fn text(values: &[&str]) -> Row {
        values.iter().map(|value| CellValue::from(*value)).collect()
    }

    /// Reverses the field encoding: strips outer quotes and undoubles quotes.
    fn decode_field(field: &str) -> String {
        let inner = field
            .strip_prefix('"')
            .and_then(|field| field.strip_suffix('"'))
            .unwrap_or(field);
        inner.replace("\"\"", "\"")
    }

    #[test]
    fn plain_rows_are_joined_by_the_delimiter() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a", "b", "c"]);

        let document = encoder.encode(&columns, rows(vec![text(&["x", "y", "z"])]))?;

        assert_eq!(document.text, "x,y,z\n");
        assert_eq!(document.row_count, 1);
        assert_eq!(document.extracted_filename, None);
        Ok(())
    }

    #[test]
    fn end_to_end_document_with_headers() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .delimiter(',')
            .build();
        let columns = Column::from_names(["ID", "Name"]);
        let data = vec![
            vec![CellValue::Integer(1), CellValue::from("Alice")],
            vec![CellValue::Integer(2), CellValue::from("Bob, Jr.")],
        ];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "ID,Name\n1,Alice\n2,\"Bob, Jr.\"\n");
        assert_eq!(document.row_count, 2);
        Ok(())
    }

    #[test]
    fn empty_stream_produces_empty_document() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().include_headers(true).build();
        let columns = Column::from_names(["ID"]);

        let document = encoder.encode(&columns, rows(vec![]))?;

        assert_eq!(document.text, "");
        assert_eq!(document.row_count, 0);
        Ok(())
    }

    #[test]
    fn delimiter_alone_is_quoted() {
        let encoder = CsvEncoderBuilder::new().build();
        assert_eq!(encoder.encode_field(","), "\",\"");

        let encoder = CsvEncoderBuilder::new().delimiter('|').build();
        assert_eq!(encoder.encode_field("|"), "\"|\"");
    }

    #[test]
    fn embedded_quotes_are_doubled_and_wrapped() {
        let encoder = CsvEncoderBuilder::new().build();
        assert_eq!(
            encoder.encode_field("He said \"hi\""),
            "\"He said \"\"hi\"\"\""
        );
    }

    #[test]
    fn quoting_follows_the_configured_delimiter() {
        let encoder = CsvEncoderBuilder::new().delimiter(';').build();

        assert_eq!(encoder.encode_field("Bob, Jr."), "Bob, Jr.");
        assert_eq!(encoder.encode_field("a;b"), "\"a;b\"");
    }

    #[test]
    fn values_are_trimmed() {
        let encoder = CsvEncoderBuilder::new().build();
        assert_eq!(encoder.encode_field("  padded\t"), "padded");
    }

    #[test]
    fn always_quote_wraps_every_value() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().always_quote(true).build();
        let columns = Column::from_names(["a", "b"]);

        let document = encoder.encode(&columns, rows(vec![text(&["x", ""])]))?;

        assert_eq!(document.text, "\"x\",\"\"\n");
        Ok(())
    }

    #[test]
    fn newline_keeps_quotes_by_default() {
        let encoder = CsvEncoderBuilder::new().build();

        assert_eq!(encoder.encode_field("line one\nline two"), "\"line one line two\"");
        assert_eq!(encoder.encode_field("a\r\nb"), "\"a b\"");
    }

    #[test]
    fn newline_quoting_can_be_simplified() {
        let encoder = CsvEncoderBuilder::new()
            .newline_quoting(NewlineQuoting::Simplify)
            .build();

        assert_eq!(encoder.encode_field("line one\nline two"), "line one line two");
        assert_eq!(encoder.encode_field("a,\nb"), "\"a, b\"");
    }

    #[test]
    fn decoding_a_field_recovers_the_normalized_value() {
        let encoder = CsvEncoderBuilder::new().build();
        let samples = [
            "plain",
            " padded ",
            "He said \"hi\"",
            "Bob, Jr.",
            ",",
            "\"",
            "multi\nline",
            "\"quoted, with\r\nbreak\"",
        ];

        for sample in samples {
            let expected = sample.trim().replace("\r\n", " ").replace('\n', " ");
            assert_eq!(decode_field(&encoder.encode_field(sample)), expected);
        }
    }

    #[test]
    fn non_trailing_null_drops_a_delimiter() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a", "b", "c"]);
        let data = vec![
            text(&["1", "2", "3"]),
            vec![CellValue::from("1"), CellValue::Null, CellValue::from("3")],
        ];

        let document = encoder.encode(&columns, rows(data))?;
        let lines: Vec<&str> = document.text.lines().collect();

        assert_eq!(lines, vec!["1,2,3", "1,3"]);
        assert_eq!(
            lines[0].matches(',').count(),
            lines[1].matches(',').count() + 1
        );
        Ok(())
    }

    #[test]
    fn trailing_null_is_omitted() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a", "b"]);
        let data = vec![vec![CellValue::from("1"), CellValue::Null]];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "1\n");
        Ok(())
    }

    #[test]
    fn null_is_not_an_empty_string() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a", "b", "c"]);
        let data = vec![vec![
            CellValue::from("1"),
            CellValue::from(""),
            CellValue::from("3"),
        ]];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "1,,3\n");
        Ok(())
    }

    #[test]
    fn empty_field_policy_keeps_alignment() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .null_handling(NullHandling::EmptyField)
            .always_quote(true)
            .build();
        let columns = Column::from_names(["a", "b", "c"]);
        let data = vec![
            vec![CellValue::from("1"), CellValue::Null, CellValue::from("3")],
            vec![CellValue::Null, CellValue::Null, CellValue::Null],
        ];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "\"1\",,\"3\"\n,,\n");
        Ok(())
    }

    #[test]
    fn all_null_row_becomes_an_empty_line() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a", "b"]);
        let data = vec![
            text(&["1", "2"]),
            vec![CellValue::Null, CellValue::Null],
            text(&["3", "4"]),
        ];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "1,2\n\n3,4\n");
        Ok(())
    }

    #[test]
    fn filename_column_is_extracted_and_excluded_with_headers() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .filename_column("Name")
            .build();
        let columns = Column::from_names(["ID", "Name", "Total"]);
        let data = vec![text(&["1", "report", "10"]), text(&["2", "other", "20"])];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "ID,Total\n1,10\n2,20\n");
        assert_eq!(document.extracted_filename.as_deref(), Some("report.csv"));
        Ok(())
    }

    #[test]
    fn filename_column_is_ignored_without_headers() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(false)
            .filename_column("Name")
            .build();
        let columns = Column::from_names(["ID", "Name"]);
        let data = vec![text(&["1", "report"]), text(&["2", "other"])];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "1,report\n2,other\n");
        assert_eq!(document.extracted_filename, None);
        Ok(())
    }

    #[test]
    fn filename_column_can_be_extracted_without_headers() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .filename_column("Name")
            .filename_extraction(FilenameExtraction::Always)
            .build();
        let columns = Column::from_names(["ID", "Name"]);
        let data = vec![text(&["1", "report"]), text(&["2", "other"])];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "1\n2\n");
        assert_eq!(document.extracted_filename.as_deref(), Some("report.csv"));
        Ok(())
    }

    #[test]
    fn unknown_filename_column_changes_nothing() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .filename_column("Missing")
            .build();
        let columns = Column::from_names(["ID", "Name"]);

        let document = encoder.encode(&columns, rows(vec![text(&["1", "a"])]))?;

        assert_eq!(document.text, "ID,Name\n1,a\n");
        assert_eq!(document.extracted_filename, None);
        Ok(())
    }

    #[test]
    fn csv_extension_is_not_duplicated() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .filename_column("File")
            .build();
        let columns = Column::from_names(["File", "Value"]);

        let document = encoder.encode(&columns, rows(vec![text(&["daily.csv", "1"])]))?;
        assert_eq!(document.extracted_filename.as_deref(), Some("daily.csv"));

        let document = encoder.encode(&columns, rows(vec![text(&["ab", "1"])]))?;
        assert_eq!(document.extracted_filename.as_deref(), Some("ab.csv"));
        Ok(())
    }

    #[test]
    fn null_filename_cell_excludes_column_without_a_name() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .filename_column("File")
            .build();
        let columns = Column::from_names(["File", "Value"]);
        let data = vec![vec![CellValue::Null, CellValue::from("1")]];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "Value\n1\n");
        assert_eq!(document.extracted_filename, None);
        Ok(())
    }

    #[test]
    fn crlf_terminator_and_custom_delimiter() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new()
            .include_headers(true)
            .delimiter('\t')
            .line_terminator(LineTerminator::CrLf)
            .build();
        let columns = Column::from_names(["a", "b"]);

        let document = encoder.encode(&columns, rows(vec![text(&["x", "y z"])]))?;

        assert_eq!(document.text, "a\tb\r\nx\ty z\r\n");
        Ok(())
    }

    #[test]
    fn cells_are_rendered_with_the_locale() -> Result<(), ExportError> {
        let encoder = CsvEncoderBuilder::new().locale(Locale::DeDe).build();
        let columns = Column::from_names(["amount", "day"]);
        let data = vec![vec![
            CellValue::Float(1.5),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
        ]];

        let document = encoder.encode(&columns, rows(data))?;

        assert_eq!(document.text, "\"1,5\",31.12.2024\n");
        Ok(())
    }

    #[test]
    fn row_source_error_aborts_encoding() {
        let encoder = CsvEncoderBuilder::new().build();
        let columns = Column::from_names(["a"]);
        let data = vec![
            Ok(text(&["1"])),
            Err(ExportError::RowSource("connection lost".to_string())),
            Ok(text(&["3"])),
        ];

        let result = encoder.encode(&columns, data);

        assert!(matches!(result, Err(ExportError::RowSource(_))));
    }

    #[test]
    fn quote_and_newline_delimiters_are_rejected() {
        for delimiter in ['"', '\n', '\r'] {
            let config = EncodingConfig {
                delimiter,
                ..EncodingConfig::default()
            };
            assert!(config.validate().is_err());
        }
        assert!(EncodingConfig::default().validate().is_ok());
    }
}
