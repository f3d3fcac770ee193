//! build-finished callback.
//!
//! a build machine calls `POST /api/machine-built` (or the older
//! `/api/update-run`) once its build settles. a non-empty `endpoint` marks it
//! `ready`; anything else marks it `error`. the token must name the same
//! machine as the body.

use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use shipyard_db::Database;
use shipyard_types::{BuildReport, MachineStatus, MachineUpdate};
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::handlers::ApiError;
use crate::notifier::{MACHINES_VIEW, ViewNotifier};
use crate::token::VerifiedClaim;

/// body returned on success
#[derive(Debug, Serialize, Deserialize)]
pub struct MachineBuiltResponse {
    /// always `"success"`
    pub message: String,
}

/// POST /api/machine-built
///
/// the body is parsed as json whatever the request's content type says.
pub async fn machine_built(
    State(state): State<AppState>,
    claim: VerifiedClaim,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MachineBuiltResponse>, ApiError> {
    let report = parse_report(&claim, body)?;

    apply_build_report(&state.db, &state.notifier, &claim, &report).await?;

    Ok(Json(MachineBuiltResponse {
        message: "success".to_string(),
    }))
}

fn parse_report(
    claim: &VerifiedClaim,
    body: Result<Bytes, BytesRejection>,
) -> Result<BuildReport, ApiError> {
    let err = match body {
        Ok(bytes) => match serde_json::from_slice::<BuildReport>(&bytes) {
            Ok(report) => return Ok(report),
            Err(e) => ApiError::Validation(e.to_string()),
        },
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::PayloadTooLarge(rejection.body_text())
        }
        Err(rejection) => ApiError::Validation(rejection.body_text()),
    };
    warn!(
        machine_id = %claim.machine_id,
        kind = err.kind(),
        error = %err,
        "invalid build callback body"
    );
    Err(err)
}

/// apply one build report for an authenticated machine.
///
/// writes at most one row and fires the `/machines` invalidation only after
/// the write touched it. returns the status the machine now has.
pub async fn apply_build_report<D: Database>(
    db: &D,
    notifier: &ViewNotifier,
    claim: &VerifiedClaim,
    report: &BuildReport,
) -> Result<MachineStatus, ApiError> {
    if claim.machine_id != report.machine_id {
        let err = ApiError::Authorization {
            claimed: claim.machine_id.clone(),
            requested: report.machine_id.clone(),
        };
        warn!(
            machine_id = %claim.machine_id,
            requested = %report.machine_id,
            kind = err.kind(),
            "build callback addressed another machine"
        );
        return Err(err);
    }

    let machine_id = &report.machine_id;
    let update = MachineUpdate::from_report(report);

    match (&claim.endpoint, &update.endpoint) {
        (Some(minted), Some(reported)) if minted != reported => debug!(
            machine_id = %machine_id,
            minted = %minted,
            reported = %reported,
            "reported endpoint differs from token endpoint"
        ),
        _ => {}
    }

    let rows = db
        .update_machine(machine_id, &update)
        .await
        .map_err(|e| {
            let err = ApiError::from(e);
            error!(machine_id = %machine_id, kind = err.kind(), "{err}");
            err
        })?;

    if rows == 0 {
        let err = ApiError::NotFound(machine_id.clone());
        warn!(machine_id = %machine_id, kind = err.kind(), "build callback for unknown machine");
        return Err(err);
    }

    notifier.invalidate(MACHINES_VIEW);

    info!(
        machine_id = %machine_id,
        status = %update.status,
        endpoint = update.endpoint.as_deref().unwrap_or(""),
        "machine build result recorded"
    );

    Ok(update.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shipyard_db::ShipyardDb;
    use shipyard_types::{Machine, MachineId, test_utils::TestMachineBuilder};

    fn claim(id: &str) -> VerifiedClaim {
        VerifiedClaim {
            machine_id: id.parse().unwrap(),
            endpoint: None,
            issued_at: Utc::now(),
        }
    }

    fn report(id: &str, endpoint: Option<&str>, build_log: Option<&str>) -> BuildReport {
        BuildReport {
            machine_id: id.parse().unwrap(),
            endpoint: endpoint.map(str::to_string),
            build_log: build_log.map(str::to_string),
        }
    }

    /// a store whose writes always fail
    struct FailingDb;

    impl Database for FailingDb {
        async fn ping(&self) -> shipyard_db::Result<()> {
            Ok(())
        }

        async fn create_machine(&self, machine: &Machine) -> shipyard_db::Result<Machine> {
            Ok(machine.clone())
        }

        async fn get_machine(&self, _id: &MachineId) -> shipyard_db::Result<Option<Machine>> {
            Ok(None)
        }

        async fn list_machines(&self) -> shipyard_db::Result<Vec<Machine>> {
            Ok(Vec::new())
        }

        async fn update_machine(
            &self,
            _id: &MachineId,
            _update: &MachineUpdate,
        ) -> shipyard_db::Result<u64> {
            Err(shipyard_db::Error::Connection("connection reset".into()))
        }
    }

    async fn db_with(id: &str) -> ShipyardDb {
        let db = ShipyardDb::new_in_memory().await.unwrap();
        db.create_machine(&TestMachineBuilder::new(id).build())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_success_invalidates_machines_view() {
        let db = db_with("m1").await;
        let notifier = ViewNotifier::new();
        let mut rx = notifier.subscribe();

        let status = apply_build_report(
            &db,
            &notifier,
            &claim("m1"),
            &report("m1", Some("http://10.0.0.5:8000"), None),
        )
        .await
        .unwrap();

        assert_eq!(status, MachineStatus::Ready);
        assert_eq!(rx.try_recv().unwrap().path, MACHINES_VIEW);
    }

    #[tokio::test]
    async fn test_mismatch_writes_nothing() {
        let db = db_with("m1").await;
        db.create_machine(&TestMachineBuilder::new("m2").build())
            .await
            .unwrap();
        let notifier = ViewNotifier::new();
        let mut rx = notifier.subscribe();

        let err = apply_build_report(
            &db,
            &notifier,
            &claim("m1"),
            &report("m2", Some("http://evil:1"), None),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Authorization { .. }));
        for id in ["m1", "m2"] {
            let machine = db.get_machine(&id.parse().unwrap()).await.unwrap().unwrap();
            assert_eq!(machine.status, MachineStatus::Pending);
            assert_eq!(machine.endpoint, None);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_machine_is_not_found_without_signal() {
        let db = ShipyardDb::new_in_memory().await.unwrap();
        let notifier = ViewNotifier::new();
        let mut rx = notifier.subscribe();

        let err = apply_build_report(&db, &notifier, &claim("ghost"), &report("ghost", None, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_retried_or_signalled() {
        let notifier = ViewNotifier::new();
        let mut rx = notifier.subscribe();

        let err = apply_build_report(
            &FailingDb,
            &notifier,
            &claim("m1"),
            &report("m1", Some("http://a:1"), None),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Persistence(_)));
        assert_eq!(err.public_message(), "Failed to update machine status");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replay_yields_same_record() {
        let db = db_with("m1").await;
        let notifier = ViewNotifier::new();
        let report = report("m1", None, Some("linker error"));

        apply_build_report(&db, &notifier, &claim("m1"), &report)
            .await
            .unwrap();
        let first = db.get_machine(&"m1".parse().unwrap()).await.unwrap();

        apply_build_report(&db, &notifier, &claim("m1"), &report)
            .await
            .unwrap();
        let second = db.get_machine(&"m1".parse().unwrap()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.unwrap().status, MachineStatus::Error);
    }
}
