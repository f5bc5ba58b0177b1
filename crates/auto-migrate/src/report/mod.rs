//! Failure classification and diagnostic reporting.
//!
//! Classification is pure: a failure plus the operation it interrupted maps
//! to a [`FailureCategory`], and [`FailureReport`] captures everything a
//! human needs to diagnose the problem. Writing the rendered report
//! somewhere is the job of a [`ReportSink`], injected into the executor, so
//! tests can assert on report content without capturing process output.
//!
//! Emission is best-effort and informational only. A sink never fails and
//! never changes the outcome of a migration run.

use crate::adapter::{AdapterError, Operation};
use crate::error::MigrateError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Known failure categories for a failed migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Duplicate data conflicted with a uniqueness constraint while
    /// reinserting migrated records.
    UniquenessViolation,

    /// Existing records could not be coerced to the new schema while
    /// reinserting migrated records.
    CoercionFailure,

    /// Everything else: connectivity, permissions, adapter bugs.
    Unclassified,
}

impl FailureCategory {
    /// Classify a failure by the operation it interrupted and its kind.
    ///
    /// Only the record-reinsertion step of data-preserving strategies can
    /// produce the two specialized categories; any other combination is
    /// unclassified.
    pub fn classify(operation: Operation, error: &MigrateError) -> Self {
        match (operation, error) {
            (
                Operation::CreateEach,
                MigrateError::Adapter {
                    source: AdapterError::UniquenessViolation { .. },
                    ..
                },
            ) => FailureCategory::UniquenessViolation,
            (
                Operation::CreateEach,
                MigrateError::Adapter {
                    source: AdapterError::CoercionFailure { .. },
                    ..
                },
            ) => FailureCategory::CoercionFailure,
            _ => FailureCategory::Unclassified,
        }
    }
}

/// Structured diagnostic for one failed model migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Identity of the model that failed.
    pub model: String,

    /// Operation during which the failure occurred.
    pub operation: Operation,

    /// Classified failure category.
    pub category: FailureCategory,

    /// Failure detail for the fenced block of the rendered report.
    pub details: String,
}

impl FailureReport {
    /// Build a report from a failure. Pure; performs no I/O.
    pub fn from_error(model: &str, operation: Operation, error: &MigrateError) -> Self {
        let category = FailureCategory::classify(operation, error);

        let details = match error {
            MigrateError::Adapter {
                source: AdapterError::UniquenessViolation { details },
                ..
            }
            | MigrateError::Adapter {
                source: AdapterError::CoercionFailure { details },
                ..
            } => details.clone(),
            // Prefer the adapter's structured detail, then its summary,
            // then a full dump of the error.
            MigrateError::Adapter {
                source: AdapterError::Other { summary, detail },
                ..
            } => match detail {
                Some(detail) => detail.clone(),
                None if !summary.is_empty() => summary.clone(),
                None => format!("{:?}", error),
            },
            other => other.to_string(),
        };

        FailureReport {
            model: model.to_string(),
            operation,
            category,
            details,
        }
    }

    /// Render the report as the multi-paragraph diagnostic text.
    pub fn render(&self) -> String {
        let mut message = format!(
            "\nWhen attempting to auto-migrate model `{}`, the migrator encountered ",
            self.model
        );

        match self.category {
            FailureCategory::CoercionFailure => {
                message += &format!(
                    "incompatible data.  Some existing `{model}` record(s) couldn't be \
                     adjusted automatically to match the model definition.  Usually, this \
                     is a result of recent edits to your model files; or (less often) due \
                     to incomplete inserts or modifications made directly to the database \
                     by hand.\n\
                     \n\
                     Details:\n\
                     ```\n\
                     Failed to reinsert migrated data. {details}\n\
                     ```\n",
                    model = self.model,
                    details = self.details
                );
            }
            FailureCategory::UniquenessViolation => {
                message += &format!(
                    "a conflict.  Some existing `{model}` record(s) violated a uniqueness \
                     constraint when attempting to recreate them in the database (i.e. \
                     there were duplicates).  This is usually the result of recent edits \
                     to your model files.  For example, someone might have changed a \
                     non-unique attribute to be `unique: true`, modified a unique \
                     attribute's `column_name`, or changed the primary key attribute, \
                     etc.  Otherwise (more rarely), this could be due to additional \
                     physical-layer indexes or constraints that were added directly to \
                     the database by hand.\n\
                     \n\
                     Details:\n\
                     ```\n\
                     {details}\n\
                     ```\n",
                    model = self.model,
                    details = self.details
                );
            }
            FailureCategory::Unclassified => {
                message += &format!(
                    "an unexpected error when performing the `{operation}` step.  This \
                     could have happened for a number of different reasons: be it because \
                     your database went offline, because of a db permission issue, \
                     because of some database-specific edge case, or (more rarely) it \
                     could even be due to some kind of bug in this adapter.\n\
                     \n\
                     Error details:\n\
                     ```\n\
                     {details}\n\
                     ```\n",
                    operation = self.operation,
                    details = self.details
                );
            }
        }

        message += &format!(
            "\n\
             -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- \n\
             Any existing `{model}` records were deleted, but your data from OTHER models \
             (including any relationships tracked in foreign keys and join tables) might \
             still be intact.  If you care about recovering any of that data, be sure to \
             back it up now before you continue.\n\
             \n\
             The best way to proceed from here is to clear out all of your old development \
             data and start fresh, letting the migrator generate new tables to reflect \
             your app's models.  (In other words, to DELETE ALL EXISTING DATA stored in \
             models.)\n\
             \n\
             To do that, re-run the migration using the `drop` strategy:\n\
             ```\n\
             strategy: drop\n\
             ```\n\
             \n\
             After doing that once, you should be able to go about your business as usual.\n\
             -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- \n\
             \n\
             For more about migration strategies, see the \"Migration strategies\" section \
             of the README.\n",
            model = self.model
        );

        message
    }
}

/// Destination for rendered failure reports.
pub trait ReportSink: Send + Sync {
    /// Write one report to the diagnostic stream. Emission never fails.
    fn emit(&self, report: &FailureReport);
}

/// Sink that writes rendered reports to the process error stream.
#[derive(Debug, Default)]
pub struct StderrSink;

impl ReportSink for StderrSink {
    fn emit(&self, report: &FailureReport) {
        eprintln!("{}", report.render());
    }
}

/// Sink that retains reports in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<FailureReport>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report emitted so far, in emission order.
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, report: &FailureReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
