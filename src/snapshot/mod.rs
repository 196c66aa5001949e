// src/snapshot/mod.rs

use crate::aggregate::MonthlyAggregate;
use crate::clean::{self, CleanedRecord};
use crate::error::{PipelineError, Result};
use crate::fetch::{Predicate, RawRecord, SodaClient};
use crate::transform::{self, TransformedRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One complete, consistent pipeline result: the four tables the display
/// layer consumes. Built whole or not at all, never mutated afterwards.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub cleaned: Vec<CleanedRecord>,
    pub nulls: Vec<CleanedRecord>,
    pub passenger: Vec<TransformedRecord>,
    pub monthly: Vec<MonthlyAggregate>,
    pub fetched_at: DateTime<Utc>,
    pub auth: String,
}

impl Snapshot {
    /// Run clean → transform → aggregate over a fetched batch. An empty
    /// batch yields an empty but complete snapshot.
    pub fn build(records: Vec<RawRecord>, auth: &str) -> Result<Self> {
        let (cleaned, nulls) = clean::clean(records);
        let (passenger, monthly) = transform::transform(&cleaned)?;
        Ok(Self {
            cleaned,
            nulls,
            passenger,
            monthly,
            fetched_at: Utc::now(),
            auth: auth.to_string(),
        })
    }
}

/// Holder for the currently published snapshot. Readers clone the `Arc`;
/// a refresh only ever installs a whole new one.
#[derive(Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last successfully installed snapshot, if any.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().expect("snapshot lock poisoned").clone()
    }

    pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().expect("snapshot lock poisoned") = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Fetch and rebuild, bounded by `deadline`. On any failure the
    /// previously installed snapshot stays published and servable; the
    /// returned error says why the refresh was abandoned.
    #[instrument(level = "info", skip(self, client, predicate))]
    pub async fn refresh(
        &self,
        client: &SodaClient,
        predicate: &Predicate,
        deadline: Duration,
    ) -> Result<Arc<Snapshot>> {
        let records = match tokio::time::timeout(deadline, client.fetch(predicate)).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(error = %e, "refresh fetch failed; keeping last snapshot");
                return Err(e);
            }
            Err(_) => {
                warn!(?deadline, "refresh timed out; keeping last snapshot");
                return Err(PipelineError::Timeout(deadline));
            }
        };

        let snapshot = match Snapshot::build(records, client.auth_status()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "refresh rebuild failed; keeping last snapshot");
                return Err(e);
            }
        };

        info!(
            rows = snapshot.cleaned.len(),
            nulls = snapshot.nulls.len(),
            passenger = snapshot.passenger.len(),
            months = snapshot.monthly.len(),
            "installed new snapshot"
        );
        Ok(self.install(snapshot))
    }
}
