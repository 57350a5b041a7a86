//! Monthly generation quota
//!
//! Counts cloud generations per calendar month (UTC) and refuses requests
//! once the limit is reached. The counter is persisted as JSON so restarts
//! during an event do not reset it.

use super::SpeechError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Persisted quota counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Calendar period, `YYYY-MM`
    pub period: String,
    pub used: u32,
    pub limit: u32,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

pub struct GenerationQuota {
    path: Option<PathBuf>,
    limit: u32,
    state: Mutex<QuotaStatus>,
}

fn period_of(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

impl GenerationQuota {
    /// Load the counter from `path`, starting fresh when absent or unreadable
    pub async fn load(path: PathBuf, limit: u32) -> Self {
        let status = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<QuotaStatus>(&raw) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("Ignoring unreadable quota file {:?}: {}", path, e);
                    None
                }
            },
            Err(_) => None,
        };

        let status = status
            .map(|s| QuotaStatus { limit, ..s })
            .unwrap_or_else(|| QuotaStatus {
                period: period_of(Utc::now()),
                used: 0,
                limit,
            });

        Self {
            path: Some(path),
            limit,
            state: Mutex::new(status),
        }
    }

    /// Unpersisted quota
    pub fn in_memory(limit: u32) -> Self {
        Self {
            path: None,
            limit,
            state: Mutex::new(QuotaStatus {
                period: period_of(Utc::now()),
                used: 0,
                limit,
            }),
        }
    }

    /// Current status for `now`, rolling the period over if the month changed
    pub async fn status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        let mut state = self.state.lock().await;
        self.roll_over(&mut state, now);
        state.clone()
    }

    pub async fn status(&self) -> QuotaStatus {
        self.status_at(Utc::now()).await
    }

    /// Fail with `QuotaExceeded` when no generations remain this period
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<(), SpeechError> {
        let status = self.status_at(now).await;
        if status.used >= status.limit {
            return Err(SpeechError::QuotaExceeded(format!(
                "{} of {} generations used in {}",
                status.used, status.limit, status.period
            )));
        }
        Ok(())
    }

    pub async fn check(&self) -> Result<(), SpeechError> {
        self.check_at(Utc::now()).await
    }

    /// Count one successful generation and persist
    pub async fn record_at(&self, now: DateTime<Utc>) -> Result<QuotaStatus, SpeechError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            self.roll_over(&mut state, now);
            state.used = state.used.saturating_add(1);
            state.clone()
        };
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn record(&self) -> Result<QuotaStatus, SpeechError> {
        self.record_at(Utc::now()).await
    }

    fn roll_over(&self, state: &mut QuotaStatus, now: DateTime<Utc>) {
        let period = period_of(now);
        if state.period != period {
            info!("Speech quota period rolled over {} -> {}", state.period, period);
            *state = QuotaStatus {
                period,
                used: 0,
                limit: self.limit,
            };
        }
    }

    async fn persist(&self, status: &QuotaStatus) -> Result<(), SpeechError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(status)
            .map_err(|e| SpeechError::DecodeError(format!("quota state: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
