//! The pipeline orchestrator.
//!
//! One `run` is a full batch: load, clean, run every detector in
//! registry order, persist the drafts through the sink. Detector
//! failures and rejected inserts are contained here; the only error
//! that escapes is an unreachable transaction store.

use std::time::Instant;

use chrono::{FixedOffset, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use finwatch_domain::services::detectors::{registry, Detector, DetectorContext};
use finwatch_domain::services::loader;
use finwatch_domain::utils::format_timestamp;
use finwatch_domain::AlertDraft;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy)]
struct RunSummary {
    drafts: usize,
    persisted: usize,
    duplicates: usize,
    rejected: usize,
    detector_failures: usize,
}

/// Run the pipeline with "now" taken from the configured UTC offset.
pub async fn run_analysis(state: &AppState) -> Result<usize, AppError> {
    let offset_seconds = state.config.utc_offset_hours * 3600;
    let now = FixedOffset::east_opt(offset_seconds)
        .map(|offset| Utc::now().with_timezone(&offset).naive_local())
        .unwrap_or_else(|| Utc::now().naive_utc());
    run_analysis_at(state, now).await
}

/// Run the pipeline against an explicit clock. The current month is
/// derived from `now` exactly once, so a run never straddles a month
/// boundary.
pub async fn run_analysis_at(state: &AppState, now: NaiveDateTime) -> Result<usize, AppError> {
    run_with_detectors(state, &registry(), now).await
}

/// Run an explicit detector list. Used by the default entry points and
/// by tests that inject failing detectors.
pub async fn run_with_detectors(
    state: &AppState,
    detectors: &[Detector],
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let started = Instant::now();
    let records = state
        .source
        .fetch_all()
        .await
        .map_err(AppError::StorageUnavailable)?;

    let (frame, dropped) = loader::build_frame(records);
    if dropped > 0 {
        warn!(dropped, "dropped malformed transaction rows");
    }
    if frame.is_empty() {
        warn!("no valid transactions to analyze");
        return Ok(0);
    }
    info!(rows = frame.len(), "loaded transaction frame");

    let ctx = DetectorContext::new(&state.config.detectors, now);
    let mut summary = RunSummary::default();

    for detector in detectors {
        let detector_started = Instant::now();
        let drafts = match (detector.run)(&frame, &ctx) {
            Ok(drafts) => drafts,
            Err(error) => {
                warn!(detector = detector.name, %error, "detector failed, skipping");
                summary.detector_failures += 1;
                continue;
            }
        };
        debug!(
            detector = detector.name,
            drafts = drafts.len(),
            elapsed_ms = detector_started.elapsed().as_millis() as u64,
            "detector finished"
        );

        for mut draft in drafts {
            summary.drafts += 1;
            normalize_title(&mut draft);
            match state.sink.insert(&draft, now).await {
                Ok(Some(id)) => {
                    summary.persisted += 1;
                    debug!(id, source = draft.source, "alert persisted");
                }
                Ok(None) => summary.duplicates += 1,
                Err(error) => {
                    warn!(source = draft.source, %error, "alert insert rejected");
                    summary.rejected += 1;
                }
            }
        }
    }

    info!(
        drafts = summary.drafts,
        persisted = summary.persisted,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        detector_failures = summary.detector_failures,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline run finished"
    );
    Ok(summary.persisted)
}

/// Anomaly titles carry the occurrence timestamp so the alert list
/// reads unambiguously even after the row detaches from its source.
fn normalize_title(draft: &mut AlertDraft) {
    let stamp = format_timestamp(draft.occurred_at);
    if draft.title.starts_with("Anomalia em") && !draft.title.contains(&stamp) {
        draft.title = format!("{} - {}", draft.title, stamp);
    }
}
