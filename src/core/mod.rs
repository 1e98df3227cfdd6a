/// Tabular data model and the row source abstraction.
pub mod item;

/// Steps, tasklets and their execution records.
pub mod step;
