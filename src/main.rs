mod calc;
mod config;
mod error;
mod format;
mod ipc;
mod logging;
mod scale;

use std::io::{self, BufRead, Write};

use serde_json::json;

fn main() -> anyhow::Result<()> {
    let settings = config::Settings::from_env()?;
    logging::init(&settings)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_filter = %settings.log_filter,
        "gradingd ready"
    );

    let mut state = ipc::AppState::new(settings);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed with error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparsable request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                writeln!(stdout, "{}", resp)?;
                stdout.flush()?;
                continue;
            }
        };

        let id = req.id.clone();
        let resp = ipc::handle_request(&mut state, req);
        let line = serde_json::to_string(&resp).unwrap_or_else(|e| {
            ipc::err(&id, "internal", format!("response encoding failed: {e}"), None).to_string()
        });
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
    }

    tracing::info!(requests = state.requests_served, "gradingd shutting down");
    Ok(())
}
