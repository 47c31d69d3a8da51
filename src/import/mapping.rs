use std::collections::HashMap;
use std::sync::OnceLock;

use super::normalizer::{clean_field_name, normalize_header};
use crate::scoring::StatRecord;

/// What a CSV column feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Column {
    EmployeeId,
    Year,
    Level,
    Section,
    Department,
    /// One of the fixed stat fields.
    Stat(&'static str),
    /// Any other numeric column, stored under the cleaned header.
    Extra(String),
}

static HEADER_MAP: OnceLock<HashMap<String, Column>> = OnceLock::new();

pub(crate) fn column_for_header(header: &str) -> Column {
    header_map()
        .get(&normalize_header(header))
        .cloned()
        .unwrap_or_else(|| Column::Extra(clean_field_name(header)))
}

fn header_map() -> &'static HashMap<String, Column> {
    HEADER_MAP.get_or_init(|| {
        let known: &[(&str, Column)] = &[
            // Keys
            ("employee id", Column::EmployeeId),
            ("employeeid", Column::EmployeeId),
            ("emp id", Column::EmployeeId),
            ("staff id", Column::EmployeeId),
            ("year", Column::Year),
            ("period", Column::Year),
            ("period year", Column::Year),
            ("appraisal year", Column::Year),
            // Employee attributes
            ("level", Column::Level),
            ("employee level", Column::Level),
            ("section", Column::Section),
            ("department", Column::Department),
            ("dept", Column::Department),
            // Attendance & discipline
            ("late minutes", Column::Stat(StatRecord::LATE_MINUTES)),
            ("minutes late", Column::Stat(StatRecord::LATE_MINUTES)),
            ("lateness", Column::Stat(StatRecord::LATE_MINUTES)),
            ("sick days", Column::Stat(StatRecord::SICK_DAYS)),
            ("sick leave", Column::Stat(StatRecord::SICK_DAYS)),
            ("absence days", Column::Stat(StatRecord::ABSENCE_DAYS)),
            ("absent days", Column::Stat(StatRecord::ABSENCE_DAYS)),
            ("absences", Column::Stat(StatRecord::ABSENCE_DAYS)),
            ("warning count", Column::Stat(StatRecord::WARNING_COUNT)),
            ("warnings", Column::Stat(StatRecord::WARNING_COUNT)),
            ("warning letters", Column::Stat(StatRecord::WARNING_COUNT)),
        ];

        known
            .iter()
            .map(|(header, column)| (normalize_header(header), column.clone()))
            .collect()
    })
}
