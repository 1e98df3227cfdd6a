//! # Tasklet Module
//!
//! Tasklets are single-task operations run as a step after the export, such
//! as handing the stored file to a transfer client.

#[cfg(feature = "ftp")]
#[cfg_attr(docsrs, doc(cfg(feature = "ftp")))]
pub mod ftp;
