use crate::infra::{default_questions, default_rules, load_json};
use chrono::{Datelike, Local};
use clap::Args;
use staff_appraisal::config::{parse_grade_table, AppConfig};
use staff_appraisal::error::AppError;
use staff_appraisal::import::StatImporter;
use staff_appraisal::records::{
    EvaluationRepository, EvaluationService, EvaluationView, MemoryEvaluationRepository,
};
use staff_appraisal::scoring::{
    classify, EmployeeProfile, EngineConfig, EngineOutput, EvaluationInput, IntegrityWarning,
    Question, Rule, ScoreMap, ScoringEngine, StatKey, StatRecord,
};
use staff_appraisal::telemetry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding the rule list
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// JSON file holding the question list
    #[arg(long)]
    pub(crate) questions: Option<PathBuf>,
    /// Stat CSV export; one evaluation is printed per row
    #[arg(long)]
    pub(crate) stats_csv: Option<PathBuf>,
    /// Print engine output as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct GradeArgs {
    /// Total score to classify
    pub(crate) score: f64,
    /// Inline grade table (GRADE:MIN:MAX,...); defaults to the configured table
    #[arg(long)]
    pub(crate) table: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Appraisal year for the synthetic records. Defaults to the current year.
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Print the stored evaluations as JSON after the summary.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        rules,
        questions,
        stats_csv,
        json,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let rules: Vec<Rule> = load_json(&rules)?;
    let questions: Vec<Question> = match questions {
        Some(path) => load_json(&path)?,
        None => Vec::new(),
    };
    let engine = ScoringEngine::new(rules, questions, config.scoring);

    let (inputs, stat_fields) = match stats_csv {
        Some(path) => {
            let rows = StatImporter::from_path(path)?;
            let stat_fields = extra_fields(rows.iter().map(|row| &row.stats));
            let inputs: Vec<EvaluationInput> = rows
                .into_iter()
                .map(|row| row.into_input(ScoreMap::new()))
                .collect();
            (inputs, stat_fields)
        }
        None => (vec![EvaluationInput::default()], Vec::new()),
    };

    let advisories = engine.integrity_report(
        &stat_fields.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    let outputs = engine.evaluate_batch(&inputs);

    if json {
        let payload: Vec<_> = inputs
            .iter()
            .zip(&outputs)
            .map(|(input, output)| {
                serde_json::json!({
                    "employee_id": input.employee.employee_id,
                    "evaluation": output,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    render_advisories(&advisories);
    println!("\nEvaluations ({})", outputs.len());
    for (input, output) in inputs.iter().zip(&outputs) {
        render_output(&input.employee.employee_id, output);
    }
    Ok(())
}

pub(crate) fn run_grade(args: GradeArgs) -> Result<(), AppError> {
    let table = match args.table {
        Some(raw) => parse_grade_table(&raw)?,
        None => AppConfig::load()?.scoring.grade_table,
    };
    let bucket = classify(args.score, Some(&table));
    println!(
        "{:.2} -> {} ({:.2} to {:.2})",
        args.score, bucket.grade, bucket.min, bucket.max
    );
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let year = args.year.unwrap_or_else(|| Local::now().year());
    let engine = ScoringEngine::new(default_rules(), default_questions(), EngineConfig::default());

    println!("Staff appraisal demo ({year})");
    render_advisories(&engine.integrity_report(&[]));

    let repository = Arc::new(MemoryEvaluationRepository::default());
    let service = EvaluationService::new(repository.clone(), Arc::new(engine));

    for (profile, stats, scores) in demo_employees() {
        let key = StatKey::new(profile.employee_id.clone(), year);
        if let Err(err) = service.put_stats(profile, year, stats) {
            println!("  Stat import failed for {}: {}", key.employee_id, err);
            continue;
        }
        if let Err(err) = service.rate(&key, scores) {
            println!("  Rating failed for {}: {}", key.employee_id, err);
        }
    }

    let records = match service.recalculate_all() {
        Ok(records) => records,
        Err(err) => {
            println!("Repository unavailable: {}", err);
            return Ok(());
        }
    };

    println!("\nStored evaluations ({})", records.len());
    let views: Vec<EvaluationView> = records.iter().map(|record| record.view()).collect();
    for view in &views {
        render_view(view);
    }

    let degraded = repository
        .all()
        .map(|records| {
            records
                .iter()
                .filter(|record| record.output.as_ref().is_some_and(EngineOutput::is_degraded))
                .count()
        })
        .unwrap_or_default();
    println!("\nDegraded records: {degraded}");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    }
    Ok(())
}

fn demo_employees() -> Vec<(EmployeeProfile, StatRecord, ScoreMap)> {
    let employee = |id: &str, level: &str, section: &str| EmployeeProfile {
        employee_id: id.to_string(),
        level: Some(level.to_string()),
        section: Some(section.to_string()),
        department: Some("Production".to_string()),
    };
    let stats = |late: f64, sick: f64, absence: f64, warnings: f64, imported: f64| StatRecord {
        late_minutes: late,
        sick_days: sick,
        absence_days: absence,
        warning_count: warnings,
        extra: BTreeMap::from([("imported_score".to_string(), imported)]),
    };
    let scores = |entries: &[(&str, f64)]| -> ScoreMap {
        entries
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect()
    };

    vec![
        (
            employee("E-1001", "Staff", "Assembly"),
            stats(0.0, 1.0, 0.0, 0.0, 92.0),
            scores(&[("Q1", 5.0), ("Q2", 4.0), ("Q3", 5.0)]),
        ),
        (
            employee("E-1002", "Operator", "Warehouse"),
            stats(45.0, 7.0, 2.0, 1.0, 70.0),
            scores(&[("Q1", 3.0), ("Q2", 3.0), ("Q3", 4.0)]),
        ),
        (
            employee("E-1003", "Supervisor", "Assembly"),
            stats(120.0, 0.0, 6.0, 2.0, 55.0),
            // Manual override of the imported assessment.
            scores(&[("Q1", 2.0), ("Q2", 3.0), ("Q3", 2.0), ("KPI-1", 60.0)]),
        ),
        (
            employee("E-1004", "Staff", "Packing"),
            stats(10.0, 0.0, 0.0, 0.0, 80.0),
            // Two ids that sanitize to the same symbol.
            scores(&[("Q-9", 1.0), ("Q.9", 2.0)]),
        ),
    ]
}

fn extra_fields<'a>(records: impl Iterator<Item = &'a StatRecord>) -> Vec<String> {
    let mut fields: Vec<String> = records
        .flat_map(|record| record.extra.keys().cloned())
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

fn render_advisories(advisories: &[IntegrityWarning]) {
    if advisories.is_empty() {
        println!("Rule advisories: none");
        return;
    }
    println!("Rule advisories");
    for advisory in advisories {
        println!(
            "- {} [{}]: {}",
            advisory.rule,
            advisory.kind.as_str(),
            advisory.detail
        );
    }
}

fn render_output(employee_id: &str, output: &EngineOutput) {
    let label = if employee_id.is_empty() { "(no stats)" } else { employee_id };
    println!(
        "  {:<12} discipline {:>8}  total {:>7.2}  grade {}",
        label,
        output.discipline_score.to_string(),
        output.total_score,
        output.grade
    );
    if let Some(error) = &output.setup_error {
        println!("    setup failed: {error}");
    }
    for warning in &output.warnings {
        println!(
            "    {} [{}]: {}",
            warning.rule,
            warning.kind.as_str(),
            warning.detail
        );
    }
}

fn render_view(view: &EvaluationView) {
    println!(
        "  {:<8} {}  {:<10} discipline {:>8}  total {:>7}  grade {}",
        view.employee_id,
        view.period_year,
        view.status,
        view.discipline_score.to_string(),
        view.total_score
            .map(|total| format!("{total:.2}"))
            .unwrap_or_else(|| "-".to_string()),
        view.grade.as_deref().unwrap_or("-")
    );
}
