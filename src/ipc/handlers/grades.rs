use crate::calc::{self, ActivityGradeInput, ScoreMap, StudentScores};
use crate::config::{parse_grading_config, GradingSystemConfig};
use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::types::{AppState, Request};
use serde::de::DeserializeOwned;
use serde_json::json;

fn optional_param<T: DeserializeOwned + Default>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(T::default()),
        Some(v) if v.is_null() => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("invalid params.{}: {}", key, e),
                None,
            )
        }),
    }
}

fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(v) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(v.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid params.{}: {}", key, e),
            None,
        )
    })
}

fn activities_param(req: &Request) -> Result<Vec<ActivityGradeInput>, serde_json::Value> {
    required_param(req, "activities")
}

fn scores_param(req: &Request) -> Result<ScoreMap, serde_json::Value> {
    optional_param(req, "scores")
}

fn config_from(
    state: &AppState,
    req: &Request,
    raw: &serde_json::Value,
) -> Result<GradingSystemConfig, serde_json::Value> {
    parse_grading_config(Some(raw), state.settings.weight_tolerance)
        .map_err(|e| grading_err(&req.id, &e))
}

/// Builds a branch config from the flat params the per-branch methods take.
fn branch_config(
    state: &AppState,
    req: &Request,
    system: &str,
    weights_key: Option<&str>,
) -> Result<GradingSystemConfig, serde_json::Value> {
    let mut raw = json!({
        "system": system,
        "collegeNumericScale": req.params.get("scale").cloned().unwrap_or(serde_json::Value::Null),
        "customScale": req.params.get("customScale").cloned().unwrap_or(serde_json::Value::Null),
    });
    if let Some(key) = weights_key {
        let Some(weights) = req.params.get("weights").filter(|v| !v.is_null()) else {
            return Err(err(&req.id, "bad_params", "missing weights", None));
        };
        raw[key] = weights.clone();
    }
    config_from(state, req, &raw)
}

fn handle_calculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw_config = req.params.get("config").cloned().unwrap_or_default();
    let config = match config_from(state, req, &raw_config) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let activities = match activities_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scores = match scores_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc::calculate(&config, &activities, &scores) {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_shs_initial(state: &mut AppState, req: &Request) -> serde_json::Value {
    let weights = match branch_config(state, req, "shs", Some("shsWeights")) {
        Ok(GradingSystemConfig::Shs { weights }) => weights,
        Ok(_) => return err(&req.id, "bad_params", "weights did not describe shs", None),
        Err(e) => return e,
    };
    let activities = match activities_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scores = match scores_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc::calculate_shs_initial_grade(&scores, &activities, &weights) {
        Ok(initial_grade) => ok(&req.id, json!({ "initialGrade": initial_grade })),
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_college_term(state: &mut AppState, req: &Request) -> serde_json::Value {
    let weights = match branch_config(state, req, "collegeTerm", Some("collegeTermWeights")) {
        Ok(GradingSystemConfig::CollegeTerm { weights, .. }) => weights,
        Ok(_) => {
            return err(
                &req.id,
                "bad_params",
                "weights did not describe collegeTerm",
                None,
            )
        }
        Err(e) => return e,
    };
    let activities = match activities_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scores = match scores_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc::calculate_college_final_grade(&scores, &activities, &weights) {
        Ok(grade) => ok(&req.id, json!(grade)),
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_college_gwa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let scale = match branch_config(state, req, "collegeGwa", None) {
        Ok(GradingSystemConfig::CollegeGwa { scale }) => scale,
        Ok(_) => return err(&req.id, "bad_params", "scale did not describe collegeGwa", None),
        Err(e) => return e,
    };
    let activities = match activities_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scores = match scores_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc::calculate_college_gwa(&scores, &activities, &scale) {
        Ok(gwa) => ok(&req.id, json!({ "gwa": gwa })),
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_team_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw_config = req.params.get("config").cloned().unwrap_or_default();
    let config = match config_from(state, req, &raw_config) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let activities = match activities_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students: Vec<StudentScores> = match required_param(req, "students") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc::team_report(&config, &activities, &students) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => grading_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.calculate" => Some(handle_calculate(state, req)),
        "grades.shsInitial" => Some(handle_shs_initial(state, req)),
        "grades.collegeTerm" => Some(handle_college_term(state, req)),
        "grades.collegeGwa" => Some(handle_college_gwa(state, req)),
        "grades.teamReport" => Some(handle_team_report(state, req)),
        _ => None,
    }
}
