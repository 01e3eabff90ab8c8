use crate::config::parse_numeric_scale;
use crate::format::format_college;
use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::scale::{
    college_remark, college_scale_table, shs_descriptor, transmute_shs_grade, NumericScale,
    SHS_DESCRIPTORS, SHS_TRANSMUTATION,
};
use serde_json::json;

fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn scale_param(req: &Request) -> Result<NumericScale, serde_json::Value> {
    parse_numeric_scale(req.params.get("scale"), req.params.get("customScale"))
        .map_err(|e| grading_err(&req.id, &e))
}

fn handle_transmute(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match required_f64(req, "rawPercentage") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let transmuted = transmute_shs_grade(raw);
    ok(
        &req.id,
        json!({
            "transmutedGrade": transmuted,
            "descriptor": shs_descriptor(transmuted),
        }),
    )
}

fn handle_format_college(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match required_f64(req, "raw") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scale = match scale_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match format_college(raw, &scale) {
        Ok(formatted) => {
            let value = college_scale_table(&scale).scale_value(raw);
            ok(
                &req.id,
                json!({
                    "formatted": formatted,
                    "scaleValue": value,
                    "remark": college_remark(value, &scale),
                }),
            )
        }
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_table(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let scale = match scale_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let table = college_scale_table(&scale);
    ok(
        &req.id,
        json!({
            "scale": scale.as_str(),
            "decimals": table.decimals,
            "passingValue": table.passing_value,
            "lowerIsBetter": table.lower_is_better,
            "bands": table.bands(),
        }),
    )
}

fn handle_shs_table(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "transmutation": SHS_TRANSMUTATION,
            "descriptors": SHS_DESCRIPTORS,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scales.transmute" => Some(handle_transmute(state, req)),
        "scales.formatCollege" => Some(handle_format_college(state, req)),
        "scales.table" => Some(handle_table(state, req)),
        "scales.shsTable" => Some(handle_shs_table(state, req)),
        _ => None,
    }
}
