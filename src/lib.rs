#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # CSV SQL Exporter

 Exports the result of a SQL table, view or stored procedure to a CSV file and
 optionally uploads that file to an FTP server.

 ## Core Concepts

- **RowSource:** Yields the columns of a result set and then its rows, one at a time.
- **CsvEncoder:** Turns the columns and rows into CSV text, applying the quoting,
  delimiter, header and locale rules of its `EncodingConfig`. It can take the output
  file name from a column of the first row.
- **CsvFileSink:** Stores an encoded document under a folder, either with the
  configured file name or with the name extracted by the encoder.
- **Step / Tasklet:** The export and the upload run as steps, one after the other.

 ## Features

| **Feature**   | **Description**                                         |
|---------------|---------------------------------------------------------|
| rdbc-postgres | Reads rows from PostgreSQL                              |
| rdbc-mysql    | Reads rows from MySQL and MariaDB                       |
| rdbc-sqlite   | Reads rows from SQLite                                  |
| ftp           | Uploads the exported file over FTP or FTPS              |
| full          | Enables all available features                          |

 ## Getting Started

 The encoder works with any row source, for example rows held in memory:

```rust
use csv_sql_exporter::{
    core::item::{CellValue, Column},
    item::{csv::csv_encoder::CsvEncoderBuilder, memory::MemoryRowSource},
};

# fn main() -> Result<(), csv_sql_exporter::ExportError> {
let mut source = MemoryRowSource::new(
    Column::from_names(["City", "Population"]),
    vec![
        vec![CellValue::from("London"), CellValue::Integer(8_982_000)],
        vec![CellValue::from("Paris, FR"), CellValue::Null],
    ],
);

let encoder = CsvEncoderBuilder::new().include_headers(true).build();
let document = encoder.encode_source(&mut source)?;

assert_eq!(document.text, "City,Population\nLondon,8982000\n\"Paris, FR\"\n");
# Ok(())
# }
```

 The command line tool reads everything else from `appsettings.json`: the
 database connection, the table or procedure to read, the CSV options and the
 FTP upload.
 */

/// Application settings read from `appsettings.json`
pub mod config;

/// Rows, row sources, steps and tasklets
pub mod core;

/// Error types for export operations
pub mod error;

pub use error::*;

/// Export orchestration: encode, store and upload
pub mod export;

/// Row sources and the CSV encoder and sink
pub mod item;

/// Culture rules used to render dates and numbers
pub mod locale;

/// Logger setup for the command line tool
pub mod logging;

/// Operations run after the export, such as the FTP upload
pub mod tasklet;
