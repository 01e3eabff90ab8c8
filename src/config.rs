use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::GradingError;
use crate::scale::{Band, CustomScale, NumericScale};

pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 0.000_001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShsWeights {
    pub written_work: f64,
    pub performance_task: f64,
    pub quarterly_assessment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermWeights {
    pub prelim: f64,
    pub midterm: f64,
    #[serde(rename = "final")]
    pub final_term: f64,
}

/// A team's grading setup, snapshotted for one calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingSystemConfig {
    Shs {
        weights: ShsWeights,
    },
    CollegeTerm {
        weights: TermWeights,
        scale: NumericScale,
    },
    CollegeGwa {
        scale: NumericScale,
    },
    Unconfigured,
}

impl GradingSystemConfig {
    pub fn system_name(&self) -> &'static str {
        match self {
            GradingSystemConfig::Shs { .. } => "shs",
            GradingSystemConfig::CollegeTerm { .. } => "collegeTerm",
            GradingSystemConfig::CollegeGwa { .. } => "collegeGwa",
            GradingSystemConfig::Unconfigured => "unconfigured",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    system: Option<String>,
    shs_weights: Option<ShsWeights>,
    college_term_weights: Option<TermWeights>,
    college_numeric_scale: Option<String>,
    custom_scale: Option<RawCustomScale>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCustomScale {
    bands: Vec<Band<f64>>,
    #[serde(default = "default_decimals")]
    decimals: usize,
    passing_value: f64,
    #[serde(default = "default_lower_is_better")]
    lower_is_better: bool,
}

fn default_decimals() -> usize {
    2
}

fn default_lower_is_better() -> bool {
    true
}

/// Parses and validates a team's grading configuration.
///
/// A missing or null config is treated as `Unconfigured`.
pub fn parse_grading_config(
    raw: Option<&serde_json::Value>,
    weight_tolerance: f64,
) -> Result<GradingSystemConfig, GradingError> {
    let raw = match raw {
        None => return Ok(GradingSystemConfig::Unconfigured),
        Some(v) if v.is_null() => return Ok(GradingSystemConfig::Unconfigured),
        Some(v) => v,
    };
    let cfg: RawConfig = serde_json::from_value(raw.clone())
        .map_err(|e| GradingError::config(format!("config: {e}")))?;

    let system = cfg.system.as_deref().unwrap_or("unconfigured");
    match system {
        "shs" => {
            let Some(weights) = cfg.shs_weights else {
                return Err(GradingError::config("shsWeights is required for shs"));
            };
            check_weights(
                "shsWeights",
                &[
                    ("writtenWork", weights.written_work),
                    ("performanceTask", weights.performance_task),
                    ("quarterlyAssessment", weights.quarterly_assessment),
                ],
                weight_tolerance,
            )?;
            Ok(GradingSystemConfig::Shs { weights })
        }
        "collegeTerm" => {
            let Some(weights) = cfg.college_term_weights else {
                return Err(GradingError::config(
                    "collegeTermWeights is required for collegeTerm",
                ));
            };
            check_weights(
                "collegeTermWeights",
                &[
                    ("prelim", weights.prelim),
                    ("midterm", weights.midterm),
                    ("final", weights.final_term),
                ],
                weight_tolerance,
            )?;
            let scale = resolve_scale(
                cfg.college_numeric_scale.as_deref(),
                cfg.custom_scale,
            )?;
            Ok(GradingSystemConfig::CollegeTerm { weights, scale })
        }
        "collegeGwa" => {
            let scale = resolve_scale(
                cfg.college_numeric_scale.as_deref(),
                cfg.custom_scale,
            )?;
            Ok(GradingSystemConfig::CollegeGwa { scale })
        }
        "unconfigured" => Ok(GradingSystemConfig::Unconfigured),
        other => Err(GradingError::config(format!(
            "unrecognized grading system: {other}"
        ))),
    }
}

/// Parses a scale name plus optional custom table, as sent by the scale
/// inspection methods.
pub fn parse_numeric_scale(
    name: Option<&serde_json::Value>,
    custom: Option<&serde_json::Value>,
) -> Result<NumericScale, GradingError> {
    let name = match name {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| GradingError::config("scale must be a string"))?,
        ),
    };
    let custom = match custom {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(
            serde_json::from_value::<RawCustomScale>(v.clone())
                .map_err(|e| GradingError::config(format!("customScale: {e}")))?,
        ),
    };
    resolve_scale(name, custom)
}

fn resolve_scale(
    name: Option<&str>,
    custom: Option<RawCustomScale>,
) -> Result<NumericScale, GradingError> {
    match name {
        None => Err(GradingError::config("collegeNumericScale is required")),
        Some("custom") => {
            let Some(c) = custom else {
                return Err(GradingError::config(
                    "customScale is required when the scale is custom",
                ));
            };
            Ok(NumericScale::Custom(CustomScale::new(
                c.bands,
                c.decimals,
                c.passing_value,
                c.lower_is_better,
            )?))
        }
        Some(other) => NumericScale::builtin(other),
    }
}

fn check_weights(
    group: &str,
    weights: &[(&str, f64)],
    tolerance: f64,
) -> Result<(), GradingError> {
    for (name, w) in weights {
        if !w.is_finite() || !(0.0..=1.0).contains(w) {
            return Err(GradingError::config(format!(
                "{group}.{name} must be within [0, 1], got {w}"
            )));
        }
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > tolerance {
        tracing::warn!(group, sum, "grading weights do not sum to 1.0");
    }
    Ok(())
}

/// Process-level settings read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_filter: String,
    pub weight_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(filter) = lookup("GRADINGD_LOG") {
            let t = filter.trim();
            if !t.is_empty() {
                settings.log_filter = t.to_string();
            }
        }
        if let Some(raw) = lookup("GRADINGD_WEIGHT_TOLERANCE") {
            let tolerance: f64 = raw
                .trim()
                .parse()
                .with_context(|| format!("GRADINGD_WEIGHT_TOLERANCE is not a number: {raw}"))?;
            if !tolerance.is_finite() || tolerance < 0.0 {
                anyhow::bail!("GRADINGD_WEIGHT_TOLERANCE must be a non-negative number");
            }
            settings.weight_tolerance = tolerance;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
    use tracing_subscriber::Layer;

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
            }
        }
    }

    fn parse(v: serde_json::Value) -> Result<GradingSystemConfig, GradingError> {
        parse_grading_config(Some(&v), DEFAULT_WEIGHT_TOLERANCE)
    }

    #[test]
    fn missing_config_is_unconfigured() {
        assert_eq!(
            parse_grading_config(None, DEFAULT_WEIGHT_TOLERANCE),
            Ok(GradingSystemConfig::Unconfigured)
        );
        assert_eq!(
            parse(json!({ "system": "unconfigured" })),
            Ok(GradingSystemConfig::Unconfigured)
        );
    }

    #[test]
    fn parses_shs_weights() {
        let cfg = parse(json!({
            "system": "shs",
            "shsWeights": { "writtenWork": 0.3, "performanceTask": 0.5, "quarterlyAssessment": 0.2 }
        }))
        .expect("shs config");
        assert_eq!(
            cfg,
            GradingSystemConfig::Shs {
                weights: ShsWeights {
                    written_work: 0.3,
                    performance_task: 0.5,
                    quarterly_assessment: 0.2,
                }
            }
        );
        assert_eq!(cfg.system_name(), "shs");
    }

    #[test]
    fn unbalanced_weights_are_accepted_with_a_warning() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let cfg = parse(json!({
                "system": "shs",
                "shsWeights": { "writtenWork": 0.5, "performanceTask": 0.5, "quarterlyAssessment": 0.5 }
            }));
            assert!(cfg.is_ok());
            assert_eq!(warnings.load(AtomicOrdering::SeqCst), 1);

            let balanced = parse(json!({
                "system": "shs",
                "shsWeights": { "writtenWork": 0.3, "performanceTask": 0.5, "quarterlyAssessment": 0.2 }
            }));
            assert!(balanced.is_ok());
            assert_eq!(warnings.load(AtomicOrdering::SeqCst), 1);
        });
    }

    #[test]
    fn weight_outside_unit_range_is_rejected() {
        let e = parse(json!({
            "system": "collegeTerm",
            "collegeTermWeights": { "prelim": 1.5, "midterm": 0.3, "final": 0.4 },
            "collegeNumericScale": "fivePoint"
        }))
        .expect_err("weight out of range");
        assert_eq!(e.code(), "configuration_error");
    }

    #[test]
    fn college_term_needs_weights_and_scale() {
        assert!(parse(json!({ "system": "collegeTerm", "collegeNumericScale": "fivePoint" })).is_err());
        assert!(parse(json!({
            "system": "collegeTerm",
            "collegeTermWeights": { "prelim": 0.3, "midterm": 0.3, "final": 0.4 }
        }))
        .is_err());
        let cfg = parse(json!({
            "system": "collegeTerm",
            "collegeTermWeights": { "prelim": 0.3, "midterm": 0.3, "final": 0.4 },
            "collegeNumericScale": "fourPoint"
        }))
        .expect("college term config");
        assert!(matches!(
            cfg,
            GradingSystemConfig::CollegeTerm {
                scale: NumericScale::FourPoint,
                ..
            }
        ));
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        let e = parse(json!({ "system": "montessori" })).expect_err("unknown system");
        assert_eq!(e.code(), "configuration_error");
        let e = parse(json!({ "system": "collegeGwa", "collegeNumericScale": "sixPoint" }))
            .expect_err("unknown scale");
        assert_eq!(e.code(), "configuration_error");
    }

    #[test]
    fn custom_scale_requires_valid_table() {
        let cfg = parse(json!({
            "system": "collegeGwa",
            "collegeNumericScale": "custom",
            "customScale": {
                "bands": [{ "min": 90, "value": 1.25 }, { "min": 70, "value": 2.5 }, { "min": 0, "value": 5.0 }],
                "passingValue": 3.0
            }
        }))
        .expect("custom config");
        assert!(matches!(
            cfg,
            GradingSystemConfig::CollegeGwa {
                scale: NumericScale::Custom(_)
            }
        ));

        assert!(parse(json!({ "system": "collegeGwa", "collegeNumericScale": "custom" })).is_err());
        assert!(parse(json!({
            "system": "collegeGwa",
            "collegeNumericScale": "custom",
            "customScale": { "bands": [{ "min": 50, "value": 1.0 }], "passingValue": 3.0 }
        }))
        .is_err());
    }

    #[test]
    fn parse_numeric_scale_accepts_builtin_names() {
        let s = parse_numeric_scale(Some(&json!("hundredPoint")), None).expect("scale");
        assert_eq!(s, NumericScale::HundredPoint);
        assert!(parse_numeric_scale(Some(&json!(5)), None).is_err());
        assert!(parse_numeric_scale(None, None).is_err());
    }

    #[test]
    fn settings_from_lookup() {
        let s = Settings::from_lookup(|_| None).expect("defaults");
        assert_eq!(s, Settings::default());

        let s = Settings::from_lookup(|k| match k {
            "GRADINGD_LOG" => Some("gradingd=debug".to_string()),
            "GRADINGD_WEIGHT_TOLERANCE" => Some("0.01".to_string()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(s.log_filter, "gradingd=debug");
        assert_eq!(s.weight_tolerance, 0.01);

        assert!(Settings::from_lookup(|k| (k == "GRADINGD_WEIGHT_TOLERANCE")
            .then(|| "lots".to_string()))
        .is_err());
    }
}
