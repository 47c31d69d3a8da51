//! Stat CSV loader for attendance/discipline exports.

mod mapping;
mod normalizer;
mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::scoring::{EvaluationInput, ScoreMap};

pub use parser::ImportedStats;

#[derive(Debug)]
pub enum StatImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn {
        column: &'static str,
    },
    MissingValue {
        line: u64,
        column: &'static str,
    },
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
}

impl std::fmt::Display for StatImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatImportError::Io(err) => write!(f, "failed to read stat export: {err}"),
            StatImportError::Csv(err) => write!(f, "invalid stat CSV data: {err}"),
            StatImportError::MissingColumn { column } => {
                write!(f, "stat export has no '{column}' column")
            }
            StatImportError::MissingValue { line, column } => {
                write!(f, "line {line}: '{column}' is empty")
            }
            StatImportError::InvalidValue {
                line,
                column,
                value,
            } => write!(f, "line {line}, column '{column}': '{value}' is not a number"),
        }
    }
}

impl std::error::Error for StatImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatImportError::Io(err) => Some(err),
            StatImportError::Csv(err) => Some(err),
            StatImportError::MissingColumn { .. }
            | StatImportError::MissingValue { .. }
            | StatImportError::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for StatImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for StatImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl ImportedStats {
    /// Engine input for this row, carrying any manual scores already on file.
    pub fn into_input(self, scores: ScoreMap) -> EvaluationInput {
        EvaluationInput {
            employee: self.profile,
            stats: Some(self.stats),
            scores,
        }
    }
}

pub struct StatImporter;

impl StatImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ImportedStats>, StatImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parses every row. A repeated (employee, year) key keeps its first row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ImportedStats>, StatImportError> {
        let mut seen = HashSet::new();
        let mut imported = Vec::new();

        for row in parser::parse_rows(reader)? {
            if !seen.insert(row.key.clone()) {
                warn!(
                    employee = %row.key.employee_id,
                    year = row.key.period_year,
                    line = row.line,
                    "duplicate stat row ignored"
                );
                continue;
            }
            imported.push(row);
        }

        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StatKey;
    use std::io::Cursor;

    #[test]
    fn importer_maps_fixed_fields_attributes_and_extras() {
        let csv = "\u{feff}Employee ID,Year,Level,Section,Late Minutes,Sick Days,Absences,Warnings,imported_score,[KPI-1]\n\
E-100,2025,Staff,Assembly,35,2,1,0,82.5,\n\
E-200,2025,Manager,,0,,,1,,64\n";

        let rows = StatImporter::from_reader(Cursor::new(csv)).expect("import succeeds");
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.key, StatKey::new("E-100", 2025));
        assert_eq!(first.profile.level.as_deref(), Some("Staff"));
        assert_eq!(first.profile.section.as_deref(), Some("Assembly"));
        assert_eq!(first.stats.late_minutes, 35.0);
        assert_eq!(first.stats.sick_days, 2.0);
        assert_eq!(first.stats.absence_days, 1.0);
        assert_eq!(first.stats.get("imported_score"), Some(82.5));
        assert_eq!(first.stats.get("[KPI-1]"), None);

        let second = &rows[1];
        assert_eq!(second.profile.section, None);
        assert_eq!(second.stats.warning_count, 1.0);
        assert_eq!(second.stats.get("[KPI-1]"), Some(64.0));
    }

    #[test]
    fn importer_names_row_and_column_for_bad_numbers() {
        let csv = "Employee ID,Year,Late Minutes\nE-1,2025,10\nE-2,2025,ten\n";
        let error = StatImporter::from_reader(Cursor::new(csv)).expect_err("invalid value");

        match error {
            StatImportError::InvalidValue {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "Late Minutes");
                assert_eq!(value, "ten");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn importer_requires_key_columns() {
        let error = StatImporter::from_reader(Cursor::new("Name,Late Minutes\nAnn,4\n"))
            .expect_err("missing id column");
        assert!(matches!(
            error,
            StatImportError::MissingColumn {
                column: "employee id"
            }
        ));

        let error = StatImporter::from_reader(Cursor::new("Employee ID,Year\n,2025\n"))
            .expect_err("missing id value");
        assert!(matches!(error, StatImportError::MissingValue { line: 2, .. }));
    }

    #[test]
    fn importer_keeps_first_row_for_duplicate_keys() {
        let csv = "Employee ID,Year,Late Minutes\nE-1,2025,10\nE-1,2025,99\nE-1,2024,5\n";
        let rows = StatImporter::from_reader(Cursor::new(csv)).expect("import succeeds");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stats.late_minutes, 10.0);
        assert_eq!(rows[1].key.period_year, 2024);
    }

    #[test]
    fn importer_from_path_propagates_io_errors() {
        let error =
            StatImporter::from_path("./does-not-exist.csv").expect_err("expected io error");
        match error {
            StatImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
