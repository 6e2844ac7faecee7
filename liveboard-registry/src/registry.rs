//! Activity lifecycle and reconciliation.
//!
//! The registry maps client ids to platform handles. It is a cache: the
//! platform decides which surfaces exist, and [`ActivityRegistry::recover`]
//! rebuilds the map from the platform after a restart.
//!
//! ## Locking
//!
//! A single `tokio::sync::Mutex` guards the record map and is never held
//! across a platform call. Operations addressing the same id additionally
//! queue on a per-id lock, so an `update` and an `end` racing on one
//! activity apply in arrival order instead of interleaving their platform
//! calls.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use liveboard_core::{
    template, Behavior, CompressionGate, DynamicIslandLayout, LayoutElement, SegmentSet, ValueMap,
};
use tokio::sync::Mutex;

use crate::config::RegistryConfig;
use crate::error::{ActivityError, ActivityResult, StoreError};
use crate::platform::{
    ActivityAttributes, ActivityPlatform, ActivityRequest, AlertConfig, ContentState,
    DismissalPolicy, PlatformActivity, PlatformHandle,
};
use crate::record::{ActivityId, ActivityRecord, ActivityState, ActivitySummary};
use crate::snapshot::SnapshotStore;

/// Everything needed to start an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    /// Lock screen layout.
    pub layout: LayoutElement,
    /// Island presentations. At least one expanded region is required.
    pub dynamic_island: DynamicIslandLayout,
    /// Presentation settings.
    pub behavior: Behavior,
    /// Initial data dictionary.
    pub data: ValueMap,
    /// When the content goes stale (ms since epoch).
    pub stale_at_ms: Option<u64>,
    /// Ordering hint among this app's activities.
    pub relevance_score: Option<f64>,
}

impl StartRequest {
    /// A request with empty data and no staleness or relevance hints.
    #[must_use]
    pub fn new(
        layout: LayoutElement,
        dynamic_island: DynamicIslandLayout,
        behavior: Behavior,
    ) -> Self {
        Self {
            layout,
            dynamic_island,
            behavior,
            data: ValueMap::new(),
            stale_at_ms: None,
            relevance_score: None,
        }
    }

    /// Set the initial data dictionary.
    #[must_use]
    pub fn with_data(mut self, data: ValueMap) -> Self {
        self.data = data;
        self
    }

    /// Set the stale date.
    #[must_use]
    pub fn with_stale_at(mut self, stale_at_ms: u64) -> Self {
        self.stale_at_ms = Some(stale_at_ms);
        self
    }

    /// Set the relevance score.
    #[must_use]
    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }
}

/// What a recovery sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Ids rebuilt from live platform surfaces.
    pub inserted: Vec<ActivityId>,
    /// Ids dropped because the platform no longer reports their handle.
    pub pruned: Vec<ActivityId>,
}

impl RecoveryReport {
    /// Whether the sweep changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.pruned.is_empty()
    }
}

type OpLock = Arc<Mutex<()>>;

/// Tracks live activities for one process.
pub struct ActivityRegistry {
    platform: Arc<dyn ActivityPlatform>,
    gate: CompressionGate,
    records: Mutex<HashMap<ActivityId, ActivityRecord>>,
    op_locks: std::sync::Mutex<HashMap<ActivityId, OpLock>>,
    snapshots: Option<SnapshotStore>,
    default_dismissal: DismissalPolicy,
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("gate", &self.gate)
            .field("snapshots", &self.snapshots)
            .field("default_dismissal", &self.default_dismissal)
            .finish_non_exhaustive()
    }
}

impl ActivityRegistry {
    /// A registry with default gate settings and no persistence.
    #[must_use]
    pub fn new(platform: Arc<dyn ActivityPlatform>) -> Self {
        Self {
            platform,
            gate: CompressionGate::default(),
            records: Mutex::new(HashMap::new()),
            op_locks: std::sync::Mutex::new(HashMap::new()),
            snapshots: None,
            default_dismissal: DismissalPolicy::Default,
        }
    }

    /// A registry configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the snapshot directory cannot be created.
    pub fn with_config(
        platform: Arc<dyn ActivityPlatform>,
        config: &RegistryConfig,
    ) -> Result<Self, StoreError> {
        let snapshots = config
            .snapshot_dir()
            .map(SnapshotStore::open)
            .transpose()?;
        Ok(Self {
            gate: CompressionGate::new(config.gate),
            snapshots,
            default_dismissal: config.dismissal,
            ..Self::new(platform)
        })
    }

    /// Use a custom gate, e.g. one with a non-default codec.
    #[must_use]
    pub fn with_gate(mut self, gate: CompressionGate) -> Self {
        self.gate = gate;
        self
    }

    /// Persist data dictionaries to `snapshots`.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: SnapshotStore) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// The gate used to encode segments.
    #[must_use]
    pub fn gate(&self) -> &CompressionGate {
        &self.gate
    }

    /// The snapshot store, if persistence is enabled.
    #[must_use]
    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Validate, encode and create a new activity.
    ///
    /// Validation and availability checks run before any platform call.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::Validation`], [`ActivityError::PlatformUnsupported`],
    /// [`ActivityError::AuthorizationDenied`], [`ActivityError::Compression`] for
    /// a layout that cannot be compressed, or the platform's error.
    pub async fn start(&self, request: StartRequest) -> ActivityResult<ActivityId> {
        request.dynamic_island.validate()?;
        request.behavior.validate()?;

        let availability = self.platform.availability();
        if !availability.supported {
            return Err(ActivityError::PlatformUnsupported);
        }
        if !availability.enabled {
            return Err(ActivityError::AuthorizationDenied);
        }

        let missing = template::missing_keys(&request.layout, &request.data);
        if !missing.is_empty() {
            tracing::debug!(?missing, "Layout binds keys absent from initial data");
        }

        let segments = SegmentSet::from_parts(
            &request.layout,
            &request.dynamic_island,
            &request.behavior,
        )?;
        let data_bytes = serde_json::to_vec(&request.data)?.len();
        let encoded = self.gate.encode(&segments, data_bytes)?;

        let id = ActivityId::new();
        let compressed = encoded.decision.compress;
        let payload_bytes = encoded.total_len() + data_bytes;
        let activity_request = ActivityRequest {
            attributes: ActivityAttributes {
                activity_id: id.to_string(),
                layout: encoded.layout,
                dynamic_island_layout: encoded.dynamic_island,
                behavior: encoded.behavior,
            },
            content: ContentState {
                data: request.data.clone(),
                stale_at_ms: request.stale_at_ms,
                relevance_score: request.relevance_score,
            },
        };

        let handle = self.platform.request(activity_request).await?;

        let record = ActivityRecord::new(
            id.clone(),
            handle.clone(),
            ActivityState::Active,
            request.data,
            Some(request.layout),
        );
        self.persist_snapshot(&id, &record.last_data);
        self.records.lock().await.insert(id.clone(), record);

        tracing::info!(
            activity_id = %id,
            handle = %handle,
            compressed,
            payload_bytes,
            "Activity started"
        );
        Ok(id)
    }

    /// Push a new data dictionary, optionally with a one-shot alert.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::ActivityNotFound`] if the id is unknown even
    /// after a recovery sweep, or the platform's error.
    pub async fn update(
        &self,
        id: &ActivityId,
        data: ValueMap,
        alert: Option<AlertConfig>,
    ) -> ActivityResult<()> {
        self.serialized(id, || self.update_locked(id, data, alert))
            .await
    }

    async fn update_locked(
        &self,
        id: &ActivityId,
        data: ValueMap,
        alert: Option<AlertConfig>,
    ) -> ActivityResult<()> {
        let handle = self.resolve_handle(id).await?;
        let alerted = alert.is_some();
        self.platform
            .update(&handle, ContentState::new(data.clone()), alert)
            .await?;

        self.persist_snapshot(id, &data);
        if let Some(record) = self.records.lock().await.get_mut(id) {
            record.last_data = data;
            record.touch(ActivityState::Updated);
        }
        tracing::info!(activity_id = %id, alerted, "Activity updated");
        Ok(())
    }

    /// End an activity with the registry's default dismissal policy.
    ///
    /// # Errors
    ///
    /// As [`ActivityRegistry::end_with_policy`].
    pub async fn end(&self, id: &ActivityId, final_data: Option<ValueMap>) -> ActivityResult<()> {
        self.end_with_policy(id, final_data, self.default_dismissal)
            .await
    }

    /// Push optional final content, retire the surface and drop the record.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::ActivityNotFound`] if the id is unknown even
    /// after a recovery sweep, or the platform's error.
    pub async fn end_with_policy(
        &self,
        id: &ActivityId,
        final_data: Option<ValueMap>,
        policy: DismissalPolicy,
    ) -> ActivityResult<()> {
        self.serialized(id, || self.end_locked(id, final_data, policy))
            .await
    }

    async fn end_locked(
        &self,
        id: &ActivityId,
        final_data: Option<ValueMap>,
        policy: DismissalPolicy,
    ) -> ActivityResult<()> {
        let handle = self.resolve_handle(id).await?;
        self.platform
            .end(&handle, final_data.map(ContentState::new), policy)
            .await?;

        self.records.lock().await.remove(id);
        self.remove_snapshot(id);
        tracing::info!(activity_id = %id, ?policy, "Activity ended");
        Ok(())
    }

    /// Every known activity with its platform-reported state, sorted by id.
    ///
    /// Runs a recovery sweep first.
    ///
    /// # Errors
    ///
    /// Returns the platform's error if enumeration fails.
    pub async fn list(&self) -> ActivityResult<Vec<ActivitySummary>> {
        let (_, surfaces) = self.sweep().await?;
        let reported: HashMap<&PlatformHandle, ActivityState> = surfaces
            .iter()
            .map(|s| (&s.handle, s.state.to_activity_state()))
            .collect();

        let records = self.records.lock().await;
        let mut summaries: Vec<ActivitySummary> = records
            .values()
            .map(|record| {
                // Records started during the sweep are not in `reported` yet
                let state = reported.get(&record.handle).copied().unwrap_or(
                    match record.state {
                        ActivityState::Updated => ActivityState::Active,
                        other => other,
                    },
                );
                ActivitySummary {
                    id: record.id.clone(),
                    state,
                    handle: record.handle.clone(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// A copy of the record for `id`, without consulting the platform.
    pub async fn get(&self, id: &ActivityId) -> Option<ActivityRecord> {
        self.records.lock().await.get(id).cloned()
    }

    /// Number of tracked activities.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no activities are tracked.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Reconcile the registry with the platform.
    ///
    /// Live surfaces missing from the registry are inserted under their
    /// embedded client id; records whose handle the platform no longer
    /// reports are dropped. Running it twice in a row changes nothing the
    /// second time.
    ///
    /// # Errors
    ///
    /// Returns the platform's error if enumeration fails.
    pub async fn recover(&self) -> ActivityResult<RecoveryReport> {
        let (report, _) = self.sweep().await?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn sweep(&self) -> ActivityResult<(RecoveryReport, Vec<PlatformActivity>)> {
        let started = Instant::now();
        let surfaces = self.platform.activities().await?;
        let reported: HashSet<&PlatformHandle> = surfaces.iter().map(|s| &s.handle).collect();

        let mut report = RecoveryReport::default();
        {
            let mut records = self.records.lock().await;

            report.pruned = records
                .values()
                .filter(|r| r.registered_at <= started && !reported.contains(&r.handle))
                .map(|r| r.id.clone())
                .collect();
            for id in &report.pruned {
                records.remove(id);
            }

            for surface in surfaces.iter().filter(|s| s.state.is_live()) {
                let raw_id = surface.attributes.activity_id.as_str();
                if raw_id.is_empty() {
                    tracing::warn!(handle = %surface.handle, "Live surface has no activity id");
                    continue;
                }
                let id = ActivityId::from(raw_id);
                if records.contains_key(&id) {
                    continue;
                }
                let record = ActivityRecord::new(
                    id.clone(),
                    surface.handle.clone(),
                    surface.state.to_activity_state(),
                    surface.content.data.clone(),
                    self.recover_layout(&surface.attributes),
                );
                records.insert(id.clone(), record);
                report.inserted.push(id);
            }
        }

        for id in &report.pruned {
            self.remove_snapshot(id);
        }
        if !report.is_empty() {
            tracing::info!(
                inserted = report.inserted.len(),
                pruned = report.pruned.len(),
                "Recovery sweep reconciled registry"
            );
        }
        Ok((report, surfaces))
    }

    fn recover_layout(&self, attributes: &ActivityAttributes) -> Option<LayoutElement> {
        let parsed = self
            .gate
            .decode(&attributes.layout)
            .map_err(ActivityError::from)
            .and_then(|json| LayoutElement::from_json(&json).map_err(ActivityError::from));
        match parsed {
            Ok(layout) => Some(layout),
            Err(e) => {
                tracing::debug!(
                    activity_id = %attributes.activity_id,
                    "Recovered activity without a layout: {e}"
                );
                None
            }
        }
    }

    async fn lookup(&self, id: &ActivityId) -> Option<PlatformHandle> {
        self.records.lock().await.get(id).map(|r| r.handle.clone())
    }

    /// Look `id` up, sweeping once on a miss.
    async fn resolve_handle(&self, id: &ActivityId) -> ActivityResult<PlatformHandle> {
        if let Some(handle) = self.lookup(id).await {
            return Ok(handle);
        }
        tracing::debug!(activity_id = %id, "Unknown activity, running recovery sweep");
        self.sweep().await?;
        self.lookup(id)
            .await
            .ok_or_else(|| ActivityError::ActivityNotFound(id.to_string()))
    }

    /// Run `op` while holding the per-id lock for `id`.
    async fn serialized<T, F, Fut>(&self, id: &ActivityId, op: F) -> ActivityResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ActivityResult<T>>,
    {
        let lock = self.op_lock(id);
        let result = {
            let _guard = lock.lock().await;
            op().await
        };
        self.release_op_lock(id, &lock);
        result
    }

    fn op_lock(&self, id: &ActivityId) -> OpLock {
        let mut locks = self
            .op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop the lock entry once no other operation is queued on it.
    fn release_op_lock(&self, id: &ActivityId, lock: &OpLock) {
        let mut locks = self
            .op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(id)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(id);
        }
    }

    fn persist_snapshot(&self, id: &ActivityId, data: &ValueMap) {
        let Some(ref snapshots) = self.snapshots else {
            return;
        };
        if let Err(e) = snapshots.write(id, data) {
            tracing::warn!("Failed to persist snapshot for {id}: {e}");
        }
    }

    fn remove_snapshot(&self, id: &ActivityId) {
        let Some(ref snapshots) = self.snapshots else {
            return;
        };
        if let Err(e) = snapshots.remove(id) {
            tracing::warn!("Failed to delete snapshot for {id}: {e}");
        }
    }

    #[cfg(test)]
    fn op_lock_count(&self) -> usize {
        self.op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
