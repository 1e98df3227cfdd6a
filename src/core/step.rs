use std::time::{Duration, Instant};

use log::{error, info};
use uuid::Uuid;

use crate::error::ExportError;

/// Status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step has been created but has not run yet.
    Starting,
    /// The step completed successfully.
    Success,
    /// The step failed; the export is aborted.
    Failed,
}

/// Tells the step whether a tasklet wants to be executed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStatus {
    /// The tasklet can continue to execute.
    Continuable,
    /// The tasklet has finished executing.
    Finished,
}

/// Execution record of a single step.
#[derive(Debug)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of rows successfully read
    pub read_count: usize,
    /// Number of rows written to the output document
    pub write_count: usize,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::default(),
            read_count: 0,
            write_count: 0,
        }
    }
}

/// A single operation run as a step, such as a file upload.
pub trait Tasklet {
    fn execute(&self, step_execution: &StepExecution) -> Result<RepeatStatus, ExportError>;
}

/// A sequential phase of an export.
pub trait Step {
    fn get_name(&self) -> &str;

    /// Executes the step, recording its outcome in `step_execution`.
    ///
    /// # Returns
    /// - `Ok(())`: The step completed successfully
    /// - `Err(ExportError)`: The step failed
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), ExportError>;
}

/// A step that repeatedly runs a tasklet until it reports `Finished`.
pub struct TaskletStep<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
}

impl Step for TaskletStep<'_> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), ExportError> {
        let start_time = Instant::now();
        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        let result = loop {
            match self.tasklet.execute(step_execution) {
                Ok(RepeatStatus::Continuable) => continue,
                Ok(RepeatStatus::Finished) => break Ok(()),
                Err(error) => break Err(error),
            }
        };

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                step_execution.status = StepStatus::Success;
                info!(
                    "End of step: {}, id: {}",
                    step_execution.name, step_execution.id
                );
                Ok(())
            }
            Err(error) => {
                step_execution.status = StepStatus::Failed;
                error!("Step {} failed: {}", step_execution.name, error);
                Err(error)
            }
        }
    }
}

/// Builder for tasklet steps.
pub struct StepBuilder<'a> {
    name: String,
    tasklet: Option<&'a dyn Tasklet>,
}

impl<'a> StepBuilder<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasklet: None,
        }
    }

    pub fn tasklet(mut self, tasklet: &'a dyn Tasklet) -> Self {
        self.tasklet = Some(tasklet);
        self
    }

    pub fn build(self) -> Result<TaskletStep<'a>, ExportError> {
        let tasklet = self.tasklet.ok_or_else(|| {
            ExportError::Configuration(format!("Tasklet is required for step {}", self.name))
        })?;

        Ok(TaskletStep {
            name: self.name,
            tasklet,
        })
    }
}
