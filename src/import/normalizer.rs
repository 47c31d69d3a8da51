/// Canonical form of a CSV header: BOM and zero-width characters removed,
/// underscores read as spaces, whitespace collapsed, lowercase.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "").replace('_', " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Extra stat fields keep the header as written, minus BOM and outer whitespace.
pub(crate) fn clean_field_name(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_header_removes_bom_case_and_spacing() {
        assert_eq!(normalize_header("\u{feff}Employee   ID "), "employee id");
        assert_eq!(normalize_header("late_minutes"), "late minutes");
        assert_eq!(normalize_header("Sick\tDays"), "sick days");
    }

    #[test]
    fn clean_field_name_keeps_original_spelling() {
        assert_eq!(clean_field_name(" [KPI-1] "), "[KPI-1]");
        assert_eq!(clean_field_name("\u{feff}imported_score"), "imported_score");
    }
}
