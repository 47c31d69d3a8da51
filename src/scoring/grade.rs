use serde::{Deserialize, Serialize};

/// Inclusive score range mapped to a grade label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBucket {
    pub grade: String,
    pub min: f64,
    pub max: f64,
}

impl GradeBucket {
    pub fn new(grade: &str, min: f64, max: f64) -> Self {
        Self {
            grade: grade.to_string(),
            min,
            max,
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        self.min <= score && score <= self.max
    }
}

/// Five-bucket table used when no site table is configured.
pub fn default_grade_table() -> Vec<GradeBucket> {
    vec![
        GradeBucket::new("E", 86.0, 100.0),
        GradeBucket::new("OE", 76.0, 85.99),
        GradeBucket::new("ME", 65.0, 75.99),
        GradeBucket::new("BE", 50.0, 64.99),
        GradeBucket::new("NI", 0.0, 49.99),
    ]
}

/// First bucket in table order that contains `score`, else the last bucket.
///
/// `None` or an empty table selects [`default_grade_table`]. Sortedness and
/// contiguity are not assumed.
pub fn classify(score: f64, table: Option<&[GradeBucket]>) -> GradeBucket {
    match table {
        Some(table) if !table.is_empty() => pick(score, table),
        _ => pick(score, &default_grade_table()),
    }
}

fn pick(score: f64, table: &[GradeBucket]) -> GradeBucket {
    table
        .iter()
        .find(|bucket| bucket.contains(score))
        .or_else(|| table.last())
        .cloned()
        .unwrap_or_else(|| GradeBucket::new("-", 0.0, 0.0))
}
