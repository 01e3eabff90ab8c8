use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub const METHODS: &[&str] = &[
    "health",
    "grades.calculate",
    "grades.shsInitial",
    "grades.collegeTerm",
    "grades.collegeGwa",
    "grades.teamReport",
    "scales.transmute",
    "scales.formatCollege",
    "scales.table",
    "scales.shsTable",
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    state.requests_served += 1;
    tracing::debug!(id = %req.id, method = %req.method, "request");

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::grades::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::scales::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
