//! BatchRunner: drives a replenishment run over every discovered family.
//!
//! Families are dispatched in fixed-size batches. Each batch is joined before
//! anything else happens, then the runner alone writes results, updates the
//! progress state and decides whether to checkpoint. Family tasks never see
//! the store or the progress state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use super::engine::{DecisionEngine, FamilyDecision};
use super::error::ReplenishmentError;
use super::parser::reasoning_preview;
use super::summary::{FailedFamily, RunSummary};
use super::traits::{CheckpointStore, StockDocumentStore};
use super::writer::plan_updates;
use crate::config::BatchConfig;
use crate::models::{ConclusionCounts, ProcessingResult, ProgressState, SubstrateFamily};

/// Maximum family keys listed when a filter matches nothing.
const AVAILABLE_KEYS_SHOWN: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Decide but never write to the document store.
    pub dry_run: bool,
    /// Continue from the checkpoint, skipping processed families.
    pub resume: bool,
    /// Restrict the run to one family key.
    pub family_filter: Option<String>,
}

pub struct BatchRunner {
    engine: Arc<DecisionEngine>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(engine: DecisionEngine, config: BatchConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
        }
    }

    pub async fn run(
        &self,
        store: &dyn StockDocumentStore,
        checkpoint: &dyn CheckpointStore,
        options: &RunOptions,
    ) -> Result<RunSummary, ReplenishmentError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("replenishment_run", run_id = %run_id);
        self.run_inner(run_id, store, checkpoint, options)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        store: &dyn StockDocumentStore,
        checkpoint: &dyn CheckpointStore,
        options: &RunOptions,
    ) -> Result<RunSummary, ReplenishmentError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(run_id, options.dry_run);

        tracing::info!(
            model = %self.engine.model(),
            dry_run = options.dry_run,
            resume = options.resume,
            filter = ?options.family_filter,
            concurrency = self.config.concurrency,
            "Starting replenishment run"
        );

        let mut state = if options.resume {
            match checkpoint.load()? {
                Some(state) => state,
                None => {
                    tracing::info!("No checkpoint found, starting fresh");
                    ProgressState::new(Utc::now())
                }
            }
        } else {
            ProgressState::new(Utc::now())
        };

        let discovered = store.load_families()?;
        state.retain_known(|key| discovered.contains_key(key));
        state.set_total(discovered.len());

        let families = select_families(discovered, options.family_filter.as_deref())?;
        summary.total_families = families.len();

        let pending: Vec<SubstrateFamily> = families
            .into_iter()
            .filter(|f| !(options.resume && state.is_processed(&f.key)))
            .collect();
        summary.skipped = summary.total_families - pending.len();
        if summary.skipped > 0 {
            tracing::info!(skipped = summary.skipped, "Skipping families processed by an earlier run");
        }

        let batch_size = self.config.concurrency.max(1);
        let save_every = self.config.save_every_batches.max(1);
        let total_batches = pending.len().div_ceil(batch_size);

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            let batch_no = index + 1;
            tracing::info!(
                batch = batch_no,
                total_batches,
                families = batch.len(),
                "Processing batch {batch_no}/{total_batches}"
            );

            let settled = self.dispatch(batch).await;
            for (family, outcome) in batch.iter().zip(settled) {
                self.settle(family, outcome, store, options, &mut state, &mut summary);
            }
            state.touch(Utc::now());

            let last = batch_no == total_batches;
            if batch_no % save_every == 0 || last {
                checkpoint.save(&state)?;
                tracing::info!(
                    processed = state.completed_count(),
                    failed = state.failed_count(),
                    total = state.total(),
                    "Checkpoint saved"
                );
            }

            if !last && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        if total_batches == 0 {
            state.touch(Utc::now());
            checkpoint.save(&state)?;
            tracing::info!("Nothing to process");
        }

        summary.duration = started.elapsed();
        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed.len(),
            documents = summary.documents_written,
            duration_ms = summary.duration.as_millis() as u64,
            "Replenishment run finished"
        );
        Ok(summary)
    }

    /// Run every family of the batch concurrently and wait for all of them.
    /// Outcomes come back in batch order.
    async fn dispatch(&self, batch: &[SubstrateFamily]) -> Vec<Result<(FamilyDecision, Duration), ReplenishmentError>> {
        let handles: Vec<_> = batch
            .iter()
            .map(|family| {
                let engine = Arc::clone(&self.engine);
                let family = family.clone();
                let span = tracing::info_span!("family", family = %family.key);
                tokio::spawn(
                    async move {
                        let started = Instant::now();
                        engine
                            .decide(&family)
                            .await
                            .map(|decision| (decision, started.elapsed()))
                    }
                    .instrument(span),
                )
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(batch)
            .map(|(joined, family)| {
                joined.unwrap_or_else(|e| {
                    Err(ReplenishmentError::TaskAborted {
                        key: family.key.clone(),
                        reason: e.to_string(),
                    })
                })
            })
            .collect()
    }

    fn settle(
        &self,
        family: &SubstrateFamily,
        outcome: Result<(FamilyDecision, Duration), ReplenishmentError>,
        store: &dyn StockDocumentStore,
        options: &RunOptions,
        state: &mut ProgressState,
        summary: &mut RunSummary,
    ) {
        let (decision, elapsed) = match outcome {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(family = %family.key, error = %e, "Family failed");
                record_failure(family, e.to_string(), state, summary);
                return;
            }
        };

        let counts = ConclusionCounts::from_results(&decision.results);
        tracing::info!(
            family = %family.key,
            method = %decision.method,
            materials = family.len(),
            yes = counts.yes,
            no = counts.no,
            slit = counts.slit,
            elapsed_ms = elapsed.as_millis() as u64,
            "Family decided"
        );
        if let Some(preview) = decision.raw_response.as_deref().and_then(reasoning_preview) {
            tracing::debug!(family = %family.key, reasoning = %preview, "Model reasoning");
        }

        if !options.dry_run {
            let updates = plan_updates(family, &decision.results);
            match store.apply_updates(&updates) {
                Ok(written) => {
                    summary.documents_written += written;
                    tracing::debug!(family = %family.key, documents = written, "Decisions written");
                }
                Err(e) => {
                    tracing::error!(family = %family.key, error = %e, "Writing decisions failed");
                    record_failure(family, format!("Write failed: {e}"), state, summary);
                    return;
                }
            }
        }

        state.mark_completed(&family.key);
        summary.results.push(ProcessingResult::succeeded(
            family.key.clone(),
            family.len(),
            decision.results,
            decision.method,
        ));
    }
}

fn record_failure(family: &SubstrateFamily, error: String, state: &mut ProgressState, summary: &mut RunSummary) {
    state.mark_failed(&family.key);
    summary.failed.push(FailedFamily {
        key: family.key.clone(),
        error: error.clone(),
    });
    summary
        .results
        .push(ProcessingResult::failed(family.key.clone(), family.len(), error));
}

/// Apply the optional single-family filter. An unknown key is an error that
/// lists some of the available keys.
fn select_families(
    mut families: std::collections::BTreeMap<String, SubstrateFamily>,
    filter: Option<&str>,
) -> Result<Vec<SubstrateFamily>, ReplenishmentError> {
    let Some(key) = filter.map(str::trim) else {
        return Ok(families.into_values().collect());
    };

    match families.remove(key) {
        Some(family) => Ok(vec![family]),
        None => {
            let total = families.len();
            let mut available: Vec<String> = families.into_keys().take(AVAILABLE_KEYS_SHOWN).collect();
            if total > AVAILABLE_KEYS_SHOWN {
                available.push(format!("... and {} more", total - AVAILABLE_KEYS_SHOWN));
            }
            Err(ReplenishmentError::FamilyNotFound {
                key: key.to_string(),
                available,
            })
        }
    }
}
