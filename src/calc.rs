use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{GradingSystemConfig, ShsWeights, TermWeights};
use crate::error::GradingError;
use crate::format::{format_college, format_scale_value, format_shs, round_off};
use crate::scale::{
    college_remark, college_scale_table, shs_descriptor, transmute_shs_grade, NumericScale,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    WrittenWork,
    PerformanceTask,
    QuarterlyAssessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Term {
    Prelim,
    Midterm,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityGradeInput {
    pub activity_id: String,
    pub total_points: f64,
    #[serde(default)]
    pub credit_units: f64,
    #[serde(default)]
    pub component_type: Option<ComponentType>,
    #[serde(default)]
    pub term: Option<Term>,
}

/// Activity id -> recorded score. A missing key and `None` both mean the
/// student has no score for that activity; neither is ever read as zero.
pub type ScoreMap = HashMap<String, Option<f64>>;

fn score_for(scores: &ScoreMap, activity: &ActivityGradeInput) -> Option<f64> {
    scores.get(&activity.activity_id).copied().flatten()
}

fn percent(score: f64, total_points: f64) -> f64 {
    100.0 * score / total_points
}

pub fn validate_inputs(
    activities: &[ActivityGradeInput],
    scores: &ScoreMap,
) -> Result<(), GradingError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for a in activities {
        if !seen.insert(a.activity_id.as_str()) {
            return Err(GradingError::invalid(format!(
                "duplicate activity id: {}",
                a.activity_id
            )));
        }
        if !a.total_points.is_finite() || a.total_points <= 0.0 {
            return Err(GradingError::invalid(format!(
                "activity {} has totalPoints {} (must be > 0)",
                a.activity_id, a.total_points
            )));
        }
        if !a.credit_units.is_finite() || a.credit_units < 0.0 {
            return Err(GradingError::invalid(format!(
                "activity {} has creditUnits {} (must be >= 0)",
                a.activity_id, a.credit_units
            )));
        }
        if let Some(s) = score_for(scores, a) {
            if !s.is_finite() || s < 0.0 {
                return Err(GradingError::invalid(format!(
                    "activity {} has score {} (must be >= 0)",
                    a.activity_id, s
                )));
            }
            if s > a.total_points {
                return Err(GradingError::invalid(format!(
                    "activity {} has score {} above totalPoints {}",
                    a.activity_id, s, a.total_points
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupAverage {
    /// Mean per-activity percentage, `None` when nothing in the group is scored.
    pub percent: Option<f64>,
    pub scored_count: usize,
    pub no_mark_count: usize,
}

pub fn group_average<'a, I>(activities: I, scores: &ScoreMap) -> GroupAverage
where
    I: IntoIterator<Item = &'a ActivityGradeInput>,
{
    let mut sum_percent = 0.0_f64;
    let mut scored_count = 0_usize;
    let mut no_mark_count = 0_usize;

    for a in activities {
        match score_for(scores, a) {
            None => no_mark_count += 1,
            Some(s) => {
                scored_count += 1;
                sum_percent += percent(s, a.total_points);
            }
        }
    }

    GroupAverage {
        percent: (scored_count > 0).then(|| sum_percent / scored_count as f64),
        scored_count,
        no_mark_count,
    }
}

/// Sum of `percent * weight` over the defined groups.
///
/// Undefined groups are skipped without renormalizing the remaining weights,
/// so a fully missing component lowers the total.
fn literal_weighted_sum(parts: &[(Option<f64>, f64)]) -> Option<f64> {
    let mut total: Option<f64> = None;
    for (pct, weight) in parts {
        if let Some(p) = pct {
            *total.get_or_insert(0.0) += p * weight;
        }
    }
    total
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShsBreakdown {
    written_work: GroupAverage,
    performance_task: GroupAverage,
    quarterly_assessment: GroupAverage,
    initial_grade: Option<f64>,
}

fn shs_breakdown(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    weights: &ShsWeights,
) -> ShsBreakdown {
    let component = |c: ComponentType| {
        group_average(
            activities.iter().filter(|a| a.component_type == Some(c)),
            scores,
        )
    };
    let written_work = component(ComponentType::WrittenWork);
    let performance_task = component(ComponentType::PerformanceTask);
    let quarterly_assessment = component(ComponentType::QuarterlyAssessment);

    let initial_grade = literal_weighted_sum(&[
        (written_work.percent, weights.written_work),
        (performance_task.percent, weights.performance_task),
        (quarterly_assessment.percent, weights.quarterly_assessment),
    ]);

    ShsBreakdown {
        written_work,
        performance_task,
        quarterly_assessment,
        initial_grade,
    }
}

/// Raw SHS initial grade (0-100, before transmutation).
pub fn calculate_shs_initial_grade(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    weights: &ShsWeights,
) -> Result<Option<f64>, GradingError> {
    validate_inputs(activities, scores)?;
    Ok(shs_breakdown(scores, activities, weights).initial_grade)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeTermGrade {
    pub final_grade: Option<f64>,
    /// Raw 0-100 percentage per term; mapped to a scale only when displayed.
    pub term_grades: BTreeMap<Term, Option<f64>>,
}

fn college_term_breakdown(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    weights: &TermWeights,
) -> (CollegeTermGrade, usize, usize) {
    let mut term_grades = BTreeMap::new();
    let mut parts = Vec::with_capacity(3);
    let mut scored_count = 0;
    let mut no_mark_count = 0;

    for (term, weight) in [
        (Term::Prelim, weights.prelim),
        (Term::Midterm, weights.midterm),
        (Term::Final, weights.final_term),
    ] {
        let avg = group_average(
            activities.iter().filter(|a| a.term == Some(term)),
            scores,
        );
        scored_count += avg.scored_count;
        no_mark_count += avg.no_mark_count;
        term_grades.insert(term, avg.percent);
        parts.push((avg.percent, weight));
    }

    (
        CollegeTermGrade {
            final_grade: literal_weighted_sum(&parts),
            term_grades,
        },
        scored_count,
        no_mark_count,
    )
}

pub fn calculate_college_final_grade(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    weights: &TermWeights,
) -> Result<CollegeTermGrade, GradingError> {
    validate_inputs(activities, scores)?;
    Ok(college_term_breakdown(scores, activities, weights).0)
}

fn college_gwa(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    scale: &NumericScale,
) -> (Option<f64>, usize, usize) {
    let table = college_scale_table(scale);
    let mut weighted = 0.0_f64;
    let mut units = 0.0_f64;
    let mut scored_count = 0;
    let mut no_mark_count = 0;

    for a in activities.iter().filter(|a| a.credit_units > 0.0) {
        let Some(s) = score_for(scores, a) else {
            no_mark_count += 1;
            continue;
        };
        scored_count += 1;
        weighted += table.scale_value(percent(s, a.total_points)) * a.credit_units;
        units += a.credit_units;
    }

    let gwa = (units > 0.0).then(|| weighted / units);
    (gwa, scored_count, no_mark_count)
}

/// Credit-unit weighted average, in the scale's own units.
pub fn calculate_college_gwa(
    scores: &ScoreMap,
    activities: &[ActivityGradeInput],
    scale: &NumericScale,
) -> Result<Option<f64>, GradingError> {
    validate_inputs(activities, scores)?;
    Ok(college_gwa(scores, activities, scale).0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    pub written_work: Option<f64>,
    pub performance_task: Option<f64>,
    pub quarterly_assessment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub system: &'static str,
    /// `None` means no grade is available yet, never zero.
    pub raw_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_breakdown: Option<BTreeMap<Term, Option<f64>>>,
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmuted_grade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<&'static str>,
    pub scored_count: usize,
    pub no_mark_count: usize,
}

fn not_configured() -> GradingError {
    GradingError::config("no grading system is configured for this team")
}

/// Single entry point: picks the branch from the team's configured system.
pub fn calculate(
    config: &GradingSystemConfig,
    activities: &[ActivityGradeInput],
    scores: &ScoreMap,
) -> Result<GradeResult, GradingError> {
    validate_inputs(activities, scores)?;

    let system = config.system_name();
    let result = match config {
        GradingSystemConfig::Unconfigured => return Err(not_configured()),
        GradingSystemConfig::Shs { weights } => {
            let b = shs_breakdown(scores, activities, weights);
            let transmuted = b.initial_grade.map(transmute_shs_grade);
            GradeResult {
                system,
                raw_value: b.initial_grade,
                term_breakdown: None,
                formatted: b.initial_grade.map(format_shs),
                transmuted_grade: transmuted,
                descriptor: transmuted.map(shs_descriptor),
                components: Some(ComponentBreakdown {
                    written_work: b.written_work.percent,
                    performance_task: b.performance_task.percent,
                    quarterly_assessment: b.quarterly_assessment.percent,
                }),
                remark: None,
                scored_count: b.written_work.scored_count
                    + b.performance_task.scored_count
                    + b.quarterly_assessment.scored_count,
                no_mark_count: b.written_work.no_mark_count
                    + b.performance_task.no_mark_count
                    + b.quarterly_assessment.no_mark_count,
            }
        }
        GradingSystemConfig::CollegeTerm { weights, scale } => {
            let (grade, scored_count, no_mark_count) =
                college_term_breakdown(scores, activities, weights);
            let formatted = grade
                .final_grade
                .map(|v| format_college(v, scale))
                .transpose()?;
            let remark = grade
                .final_grade
                .map(|v| college_remark(college_scale_table(scale).scale_value(v), scale));
            GradeResult {
                system,
                raw_value: grade.final_grade,
                term_breakdown: Some(grade.term_grades),
                formatted,
                transmuted_grade: None,
                descriptor: None,
                components: None,
                remark,
                scored_count,
                no_mark_count,
            }
        }
        GradingSystemConfig::CollegeGwa { scale } => {
            let (gwa, scored_count, no_mark_count) = college_gwa(scores, activities, scale);
            GradeResult {
                system,
                raw_value: gwa,
                term_breakdown: None,
                formatted: gwa.map(|v| format_scale_value(v, scale)),
                transmuted_grade: None,
                descriptor: None,
                components: None,
                remark: gwa.map(|v| college_remark(v, scale)),
                scored_count,
                no_mark_count,
            }
        }
    };

    tracing::debug!(
        system,
        graded = result.raw_value.is_some(),
        scored = result.scored_count,
        no_mark = result.no_mark_count,
        "grade calculated"
    );
    Ok(result)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentScores {
    pub student_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub scores: ScoreMap,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub student_id: String,
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub grade: GradeResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub activity_id: String,
    pub total_points: f64,
    pub scored_count: usize,
    pub no_mark_count: usize,
    pub avg_percent: Option<f64>,
    pub median_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamReport {
    pub system: &'static str,
    pub student_count: usize,
    pub graded_count: usize,
    pub ungraded_count: usize,
    pub average_raw: Option<f64>,
    pub median_raw: Option<f64>,
    pub per_student: Vec<StudentGrade>,
    pub per_activity: Vec<ActivityStats>,
}

fn compute_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Grades every student of a team and summarises the class.
///
/// Students without a grade are listed but excluded from the class average.
pub fn team_report(
    config: &GradingSystemConfig,
    activities: &[ActivityGradeInput],
    students: &[StudentScores],
) -> Result<TeamReport, GradingError> {
    if matches!(config, GradingSystemConfig::Unconfigured) {
        return Err(not_configured());
    }

    let mut per_student = Vec::with_capacity(students.len());
    let mut raw_values = Vec::new();
    for s in students {
        let grade = calculate(config, activities, &s.scores).map_err(|e| match e {
            GradingError::InvalidInput(m) => {
                GradingError::invalid(format!("student {}: {}", s.student_id, m))
            }
            other => other,
        })?;
        if let Some(v) = grade.raw_value {
            raw_values.push(v);
        }
        per_student.push(StudentGrade {
            student_id: s.student_id.clone(),
            display_name: s.display_name.clone(),
            grade,
        });
    }

    let per_activity = activities
        .iter()
        .map(|a| {
            let percents: Vec<f64> = students
                .iter()
                .filter_map(|s| score_for(&s.scores, a))
                .map(|v| percent(v, a.total_points))
                .collect();
            ActivityStats {
                activity_id: a.activity_id.clone(),
                total_points: a.total_points,
                scored_count: percents.len(),
                no_mark_count: students.len() - percents.len(),
                avg_percent: mean(&percents).map(|v| round_off(v, 1)),
                median_percent: compute_median(&percents).map(|v| round_off(v, 1)),
            }
        })
        .collect();

    let graded_count = raw_values.len();
    tracing::debug!(
        system = config.system_name(),
        students = students.len(),
        graded = graded_count,
        "team report built"
    );

    Ok(TeamReport {
        system: config.system_name(),
        student_count: students.len(),
        graded_count,
        ungraded_count: students.len() - graded_count,
        average_raw: mean(&raw_values).map(|v| round_off(v, 2)),
        median_raw: compute_median(&raw_values).map(|v| round_off(v, 2)),
        per_student,
        per_activity,
    })
}
