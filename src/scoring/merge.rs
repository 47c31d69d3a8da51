//! Fills unset read-only score slots from imported stats.

use tracing::debug;

use super::domain::{Question, ScoreMap, StatRecord};

/// Generic stat field holding a third-party assessment score.
pub const IMPORTED_SCORE_FIELD: &str = "imported_score";

/// Id/title fragments that mark a question as the imported primary score.
const IMPORTED_SCORE_HINTS: [&str; 4] = ["imported", "assessment", "kpi", "primary score"];

/// Visually confusable pairs seen in historical spreadsheet keys.
const LOOKALIKES: [(char, char); 6] = [
    ('O', '0'),
    ('0', 'O'),
    ('o', '0'),
    ('I', '1'),
    ('l', '1'),
    ('1', 'I'),
];

/// Returns a copy of `scores` with every unset read-only question filled from
/// `stats`. Existing entries are never touched.
pub fn merge_scores(
    stats: Option<&StatRecord>,
    scores: &ScoreMap,
    questions: &[Question],
) -> ScoreMap {
    let mut merged = scores.clone();
    let Some(stats) = stats else {
        return merged;
    };

    for question in questions.iter().filter(|question| question.is_read_only) {
        if merged.contains_key(&question.id) {
            continue;
        }
        let found = lookup_candidates(question).into_iter().find_map(|field| {
            stats
                .get(&field)
                .filter(|value| value.is_finite())
                .map(|value| (field, value))
        });
        if let Some((field, value)) = found {
            debug!(question = %question.id, field = %field, value, "filled read-only score from stats");
            merged.insert(question.id.clone(), value);
        }
    }

    merged
}

/// Stat field names tried for `question`, in priority order.
pub fn lookup_candidates(question: &Question) -> Vec<String> {
    let id = question.id.trim();
    let bracketed = format!("[{id}]");

    let mut candidates = vec![id.to_string(), normalize_underscores(id), bracketed.clone()];
    for (from, to) in LOOKALIKES {
        if bracketed.contains(from) {
            candidates.push(bracketed.replace(from, &to.to_string()));
        }
    }
    if suggests_imported_score(question) {
        candidates.push(IMPORTED_SCORE_FIELD.to_string());
    }

    let mut seen = std::collections::BTreeSet::new();
    candidates.retain(|candidate| seen.insert(candidate.clone()));
    candidates
}

fn normalize_underscores(id: &str) -> String {
    id.chars()
        .map(|ch| match ch {
            '-' | ' ' | '.' | '/' => '_',
            other => other,
        })
        .collect()
}

fn suggests_imported_score(question: &Question) -> bool {
    let id = question.id.to_lowercase();
    let title = question.title.to_lowercase();
    IMPORTED_SCORE_HINTS
        .iter()
        .any(|hint| id.contains(hint) || title.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn read_only(id: &str, title: &str) -> Question {
        Question {
            id: id.to_string(),
            title: title.to_string(),
            max_score: 100.0,
            is_read_only: true,
        }
    }

    fn stats_with(fields: &[(&str, f64)]) -> StatRecord {
        StatRecord {
            extra: fields
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<BTreeMap<_, _>>(),
            ..StatRecord::default()
        }
    }

    #[test]
    fn manual_entries_beat_imported_values() {
        let stats = stats_with(&[("Q1", 3.0)]);
        let scores = ScoreMap::from([("Q1".to_string(), 5.0)]);
        let merged = merge_scores(Some(&stats), &scores, &[read_only("Q1", "Attendance")]);
        assert_eq!(merged.get("Q1"), Some(&5.0));
    }

    #[test]
    fn fallback_order_prefers_exact_then_normalized_then_bracketed() {
        let question = read_only("KPI-1", "Quarterly target");
        assert_eq!(
            lookup_candidates(&question),
            vec![
                "KPI-1",
                "KPI_1",
                "[KPI-1]",
                "[KP1-1]",
                "[KPI-I]",
                "imported_score"
            ]
        );

        let stats = stats_with(&[("KPI_1", 60.0), ("[KPI-1]", 70.0)]);
        let merged = merge_scores(Some(&stats), &ScoreMap::new(), &[question]);
        assert_eq!(merged.get("KPI-1"), Some(&60.0));
    }

    #[test]
    fn lookalike_variants_recover_mistyped_keys() {
        let stats = stats_with(&[("[S0]", 8.0)]);
        let merged = merge_scores(Some(&stats), &ScoreMap::new(), &[read_only("SO", "Safety")]);
        assert_eq!(merged.get("SO"), Some(&8.0));
    }

    #[test]
    fn imported_score_field_is_used_only_for_hinted_questions() {
        let stats = stats_with(&[(IMPORTED_SCORE_FIELD, 77.5)]);
        let questions = [
            read_only("Q9", "External assessment"),
            read_only("Q7", "Punctuality"),
        ];
        let merged = merge_scores(Some(&stats), &ScoreMap::new(), &questions);
        assert_eq!(merged.get("Q9"), Some(&77.5));
        assert_eq!(merged.get("Q7"), None);
    }

    #[test]
    fn manual_questions_and_missing_stats_are_left_alone() {
        let manual = Question {
            is_read_only: false,
            ..read_only("Q1", "Teamwork")
        };
        let stats = stats_with(&[("Q1", 3.0)]);
        assert!(merge_scores(Some(&stats), &ScoreMap::new(), &[manual]).is_empty());
        assert!(merge_scores(None, &ScoreMap::new(), &[read_only("Q1", "x")]).is_empty());
    }
}
