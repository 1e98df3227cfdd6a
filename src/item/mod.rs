/// This module provides the CSV encoder and file sink.
pub mod csv;

/// This module provides an in-memory row source.
pub mod memory;

#[cfg(feature = "rdbc")]
#[cfg_attr(docsrs, doc(cfg(feature = "rdbc")))]
/// This module provides a relational database row source built on SQLx.
pub mod rdbc;
