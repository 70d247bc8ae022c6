//! Motion Minder facade
//!
//! Owns the odometer store and the sampler, consumes the host event feed
//! and executes operator commands.

use crate::command::{parse_command, Command};
use crate::report::format_stats;
use crate::sampler::MotionSampler;
use motionminder_core::{AxisSet, CommandError, MergePolicy, MotionEvent, Result, TrackingMode};
use motionminder_gcode::{CancelToken, HistoryJob, HistorySummary};
use motionminder_settings::Config;
use motionminder_store::OdometerStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Releases the running-job slot when history processing ends or is dropped
struct HistorySlot<'a>(&'a Mutex<Option<CancelToken>>);

impl Drop for HistorySlot<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.0.lock().take() {
            token.cancel();
        }
    }
}

/// Axis odometer engine bound to one store
#[derive(Debug)]
pub struct MotionMinder {
    config: Config,
    store: Arc<OdometerStore>,
    sampler: Mutex<MotionSampler>,
    history: Mutex<Option<CancelToken>>,
}

impl MotionMinder {
    /// Validate `config` and open (or create) its odometer store
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(OdometerStore::open(&config.storage.path)?);
        let sampler = MotionSampler::new(
            store.clone(),
            config.tracking.update_interval,
            config.tracking.homed_axes_only,
        );
        tracing::info!("Motion Minder using store {}", store.path().display());

        Ok(Self {
            config,
            store,
            sampler: Mutex::new(sampler),
            history: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<OdometerStore> {
        &self.store
    }

    pub fn mode(&self) -> TrackingMode {
        self.sampler.lock().mode()
    }

    /// Feed one host event to the sampler
    pub fn handle_event(&self, event: &MotionEvent) -> Result<()> {
        if event.is_lifecycle() {
            tracing::debug!("Host event: {}", event);
        }
        self.sampler.lock().handle_event(event)
    }

    /// Parse and execute one operator command line
    pub async fn execute_line(&self, line: &str) -> Result<String> {
        let command = parse_command(line, self.config.display.default_unit)?;
        self.execute(command).await
    }

    /// Execute a parsed command and return the console response
    pub async fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Stats { axes, unit } => Ok(format_stats(&self.store.snapshot(), axes, unit)),
            Command::SetOdometer {
                value,
                axes,
                unit,
                relative,
            } => {
                self.sampler.lock().flush()?;
                self.store.set_odometers(axes, value, unit, relative)?;
                tracing::info!(
                    "Odometer set for {} to {} {} (relative: {})",
                    axes,
                    value,
                    unit,
                    relative
                );
                Ok(self.confirmation("Odometer updated", axes))
            }
            Command::SetMaintenance {
                value,
                axes,
                unit,
                relative,
            } => {
                self.sampler.lock().flush()?;
                self.store.set_maintenances(axes, value, unit, relative)?;
                tracing::info!(
                    "Maintenance set for {} at {} {} (relative: {})",
                    axes,
                    value,
                    unit,
                    relative
                );
                Ok(self.confirmation("Maintenance updated", axes))
            }
            Command::ProcessHistory { merge } => {
                let directory = self.config.history.gcode_directory.as_ref().ok_or_else(|| {
                    CommandError::invalid_argument(
                        "PROCESS_HISTORY",
                        "no G-code directory configured",
                    )
                })?;
                let job = match &self.config.history.job_list {
                    Some(list) => HistoryJob::from_job_list(list, directory)?,
                    None => HistoryJob::from_directory(directory, &self.config.history.extensions)?,
                };
                let summary = self.process_history(&job).await?;
                let merged = self.merge_history(&summary, merge)?;
                let mut response = summary.describe();
                if merged {
                    response.push_str(&format!("\nMerged into odometer ({})", merge));
                } else {
                    response.push_str("\nNothing merged");
                }
                Ok(response)
            }
        }
    }

    /// Replay a history job without touching the odometer
    ///
    /// Only one job runs at a time; [`MotionMinder::cancel_history`] stops it
    /// before its next file.
    pub async fn process_history(&self, job: &HistoryJob) -> Result<HistorySummary> {
        let token = {
            let mut slot = self.history.lock();
            if slot.is_some() {
                return Err(CommandError::invalid_argument(
                    "PROCESS_HISTORY",
                    "history processing is already running",
                )
                .into());
            }
            let token = CancelToken::new();
            *slot = Some(token.clone());
            token
        };
        // Cleared on drop so an abandoned future does not block later jobs.
        let _slot = HistorySlot(&self.history);

        Ok(job.run(&token).await?)
    }

    /// Apply a history summary to the odometer; false if nothing succeeded
    pub fn merge_history(&self, summary: &HistorySummary, policy: MergePolicy) -> Result<bool> {
        if summary.success_count() == 0 {
            return Ok(false);
        }
        self.sampler.lock().flush()?;
        self.store.merge_history(&summary.total, policy)?;
        tracing::info!("Merged history job {} ({})", summary.job_id, policy);
        Ok(true)
    }

    /// Ask a running history job to stop; false if none is running
    pub fn cancel_history(&self) -> bool {
        match self.history.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Consume host events until the feed closes, then flush
    pub async fn run(&self, mut events: broadcast::Receiver<MotionEvent>) -> Result<()> {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle_event(&event) {
                        tracing::error!("Failed to record motion: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event feed lagged, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.shutdown()
    }

    /// Flush pending travel and any unsaved store state
    pub fn shutdown(&self) -> Result<()> {
        self.cancel_history();
        let sampled = self.sampler.lock().flush();
        let stored = self.store.flush();
        sampled.and(stored)
    }

    fn confirmation(&self, heading: &str, axes: AxisSet) -> String {
        format!(
            "{}\n{}",
            heading,
            format_stats(&self.store.snapshot(), axes, None)
        )
    }
}
