use std::io::Read;

use super::mapping::{column_for_header, Column};
use super::StatImportError;
use crate::scoring::{EmployeeProfile, StatKey, StatRecord};

/// One parsed CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedStats {
    pub key: StatKey,
    pub profile: EmployeeProfile,
    pub stats: StatRecord,
    /// 1-based line in the source file, header included.
    pub line: u64,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ImportedStats>, StatImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns: Vec<(Column, &str)> = headers
        .iter()
        .map(|header| (column_for_header(header), header))
        .collect();

    for required in [Column::EmployeeId, Column::Year] {
        if !columns.iter().any(|(column, _)| *column == required) {
            return Err(StatImportError::MissingColumn {
                column: match required {
                    Column::EmployeeId => "employee id",
                    _ => "year",
                },
            });
        }
    }

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(parse_row(&columns, &record, line)?);
    }

    Ok(rows)
}

fn parse_row(
    columns: &[(Column, &str)],
    record: &csv::StringRecord,
    line: u64,
) -> Result<ImportedStats, StatImportError> {
    let mut employee_id = None;
    let mut year = None;
    let mut profile = EmployeeProfile::default();
    let mut stats = StatRecord::default();

    for ((column, header), cell) in columns.iter().zip(record.iter()) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let invalid = || StatImportError::InvalidValue {
            line,
            column: header.trim().to_string(),
            value: cell.to_string(),
        };

        match column {
            Column::EmployeeId => employee_id = Some(cell.to_string()),
            Column::Year => year = Some(cell.parse::<i32>().map_err(|_| invalid())?),
            Column::Level => profile.level = Some(cell.to_string()),
            Column::Section => profile.section = Some(cell.to_string()),
            Column::Department => profile.department = Some(cell.to_string()),
            Column::Stat(field) => {
                let value = parse_number(cell).ok_or_else(invalid)?;
                match *field {
                    StatRecord::LATE_MINUTES => stats.late_minutes = value,
                    StatRecord::SICK_DAYS => stats.sick_days = value,
                    StatRecord::ABSENCE_DAYS => stats.absence_days = value,
                    _ => stats.warning_count = value,
                }
            }
            Column::Extra(field) => {
                let value = parse_number(cell).ok_or_else(invalid)?;
                stats.extra.insert(field.clone(), value);
            }
        }
    }

    let employee_id = employee_id.ok_or(StatImportError::MissingValue {
        line,
        column: "employee id",
    })?;
    let period_year = year.ok_or(StatImportError::MissingValue {
        line,
        column: "year",
    })?;
    profile.employee_id = employee_id.clone();

    Ok(ImportedStats {
        key: StatKey::new(employee_id, period_year),
        profile,
        stats,
        line,
    })
}

/// Plain decimal numbers; NaN and infinities are rejected. Commas are only
/// read as thousands separators, so a decimal comma (`1,5`) is invalid.
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let plain = if cell.contains(',') {
        strip_grouping(cell)?
    } else {
        cell.to_string()
    };
    plain.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// `-1,250.5` to `-1250.5`. Every group after the first must hold exactly three digits.
fn strip_grouping(cell: &str) -> Option<String> {
    let (sign, unsigned) = match cell.chars().next() {
        Some(sign @ ('-' | '+')) => (Some(sign), &cell[1..]),
        _ => (None, cell),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |group: &str| group.bytes().all(|byte| byte.is_ascii_digit());

    let mut groups = integer.split(',');
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 || !all_digits(head) {
        return None;
    }

    let mut plain = String::with_capacity(cell.len());
    plain.extend(sign);
    plain.push_str(head);
    for group in groups {
        if group.len() != 3 || !all_digits(group) {
            return None;
        }
        plain.push_str(group);
    }
    if let Some(fraction) = fraction {
        plain.push('.');
        plain.push_str(fraction);
    }
    Some(plain)
}
