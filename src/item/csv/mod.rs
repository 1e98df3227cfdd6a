/// Delimited text output.
///
/// This module turns query results into CSV documents and stores them.
///
/// # Module Architecture
///
/// 1. **CsvEncoder**: consumes the column list and the rows of a
///    [`RowSource`](crate::core::item::RowSource) in a single pass and builds
///    the whole document in memory. It handles field escaping, the header line,
///    the configured delimiter and the column whose first value names the
///    output file.
///
/// 2. **CsvFileSink**: persists the finished document once its final path is
///    known.
///
/// Both components follow the builder or constructor pattern used throughout
/// the crate.
///
/// # Field encoding
///
/// Every non-null value is rendered with the configured
/// [`Locale`](crate::locale::Locale), trimmed, has its `"` doubled and is
/// wrapped in quotes when it contains the delimiter, a quote or a line break
/// (or always, when requested). Line breaks are then replaced by a single
/// space. How NULLs, line breaks and the file name column behave is set by
/// the policy fields of [`EncodingConfig`](csv_encoder::EncodingConfig); the
/// defaults reproduce the historical output byte for byte.
///
/// # Examples
///
/// ```
/// use csv_sql_exporter::core::item::{CellValue, Column};
/// use csv_sql_exporter::item::csv::csv_encoder::CsvEncoderBuilder;
///
/// let columns = Column::from_names(["ID", "Name"]);
/// let rows = vec![
///     Ok(vec![CellValue::Integer(1), CellValue::from("Alice")]),
///     Ok(vec![CellValue::Integer(2), CellValue::from("Bob, Jr.")]),
/// ];
///
/// let encoder = CsvEncoderBuilder::new()
///     .include_headers(true)
///     .delimiter(',')
///     .build();
///
/// let document = encoder.encode(&columns, rows).unwrap();
/// assert_eq!(document.text, "ID,Name\n1,Alice\n2,\"Bob, Jr.\"\n");
/// ```
///
/// ## Naming the file after the data
///
/// ```
/// use csv_sql_exporter::core::item::{CellValue, Column};
/// use csv_sql_exporter::item::csv::csv_encoder::CsvEncoderBuilder;
///
/// let columns = Column::from_names(["Name", "Total"]);
/// let rows = vec![Ok(vec![CellValue::from("report"), CellValue::Integer(10)])];
///
/// let encoder = CsvEncoderBuilder::new()
///     .include_headers(true)
///     .filename_column("Name")
///     .build();
///
/// let document = encoder.encode(&columns, rows).unwrap();
/// assert_eq!(document.text, "Total\n10\n");
/// assert_eq!(document.extracted_filename.as_deref(), Some("report.csv"));
/// ```

/// A module providing the row to text encoding.
pub mod csv_encoder;

/// A module providing the file sink.
pub mod csv_sink;
