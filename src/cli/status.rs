//! `status` command: one read-only report over configured mode, live
//! health, and consistency findings. Never mutates state.

use serde::Serialize;
use tracing::debug;

use crate::config::{CoordinatorPaths, ModeConfig, ModeRecord};
use crate::errors::CoordinatorError;
use crate::store::{HealthStatus, StoreClient};
use crate::validation::{Report, ValidationReporter};

use super::output;

#[derive(Serialize)]
struct StatusDocument<'a> {
    mode_record: Option<&'a ModeRecord>,
    health: Option<&'a HealthStatus>,
    report: &'a Report,
}

/// Returns the process exit code: 0 normally, 1 when findings could not be
/// gathered at all.
pub async fn handle_status(paths: CoordinatorPaths, store: StoreClient, json: bool) -> i32 {
    let record = match ModeConfig::new(&paths).load() {
        Ok(record) => Some(record),
        Err(CoordinatorError::NotConfigured) => None,
        Err(err) => {
            debug!(error = %err, "mode record unreadable; reporter will flag it");
            None
        }
    };

    let health = store.health().await.ok();

    let report = match ValidationReporter::new(paths, store).check().await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: failed to gather findings: {}", err);
            return 1;
        }
    };

    if json {
        let document = StatusDocument {
            mode_record: record.as_ref(),
            health: health.as_ref(),
            report: &report,
        };
        match serde_json::to_string_pretty(&document) {
            Ok(rendered) => println!("{}", rendered),
            Err(err) => {
                eprintln!("error: failed to render report: {}", err);
                return 1;
            }
        }
    } else {
        output::print_status(record.as_ref(), health.as_ref(), &report);
    }

    0
}
