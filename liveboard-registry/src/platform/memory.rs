//! In-process platform implementation.
//!
//! Behaves like the OS service closely enough to exercise the registry:
//! surfaces outlive any registry instance, ended surfaces linger in the
//! `ended` state unless dismissed immediately, and availability can be
//! toggled. Used by tests and by hosts running without an OS backend.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{
    ActivityAttributes, ActivityPlatform, ActivityRequest, AlertConfig, Availability,
    ContentState, DismissalPolicy, PlatformActivity, PlatformActivityState, PlatformError,
    PlatformHandle,
};

/// Platform operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformMethod {
    /// `request`
    Request,
    /// `update`
    Update,
    /// `end`
    End,
    /// `activities`
    Activities,
}

/// Number of calls received per method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `request` calls.
    pub request: usize,
    /// `update` calls.
    pub update: usize,
    /// `end` calls.
    pub end: usize,
    /// `activities` calls.
    pub activities: usize,
}

impl CallCounts {
    /// Calls across all methods.
    #[must_use]
    pub fn total(&self) -> usize {
        self.request + self.update + self.end + self.activities
    }
}

#[derive(Debug, Default)]
struct Inner {
    surfaces: Vec<PlatformActivity>,
    alerts: Vec<(PlatformHandle, AlertConfig)>,
    calls: CallCounts,
    next_failure: Option<(PlatformMethod, PlatformError)>,
    next_handle: u64,
}

impl Inner {
    fn record_call(&mut self, method: PlatformMethod) -> Result<(), PlatformError> {
        match method {
            PlatformMethod::Request => self.calls.request += 1,
            PlatformMethod::Update => self.calls.update += 1,
            PlatformMethod::End => self.calls.end += 1,
            PlatformMethod::Activities => self.calls.activities += 1,
        }
        match self.next_failure.take() {
            Some((failing, error)) if failing == method => Err(error),
            other => {
                self.next_failure = other;
                Ok(())
            }
        }
    }

    fn allocate_handle(&mut self) -> PlatformHandle {
        self.next_handle += 1;
        PlatformHandle::new(format!("platform-{}", self.next_handle))
    }

    fn surface_mut(
        &mut self,
        handle: &PlatformHandle,
    ) -> Result<&mut PlatformActivity, PlatformError> {
        self.surfaces
            .iter_mut()
            .find(|s| &s.handle == handle)
            .ok_or_else(|| PlatformError::UnknownHandle(handle.to_string()))
    }
}

/// A platform that keeps surfaces in memory.
#[derive(Debug)]
pub struct InMemoryPlatform {
    availability: Mutex<Availability>,
    inner: Mutex<Inner>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// A supported, enabled platform with no surfaces.
    #[must_use]
    pub fn new() -> Self {
        Self {
            availability: Mutex::new(Availability::default()),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Change feature availability.
    pub fn set_availability(&self, availability: Availability) {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = availability;
    }

    /// Add a surface directly, as if it survived a process restart.
    pub fn seed(
        &self,
        attributes: ActivityAttributes,
        content: ContentState,
        state: PlatformActivityState,
    ) -> PlatformHandle {
        let mut inner = self.lock();
        let handle = inner.allocate_handle();
        inner.surfaces.push(PlatformActivity {
            handle: handle.clone(),
            attributes,
            content,
            state,
        });
        handle
    }

    /// Force a surface into `state`, e.g. to simulate the user dismissing it.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownHandle`] for unknown handles.
    pub fn set_state(
        &self,
        handle: &PlatformHandle,
        state: PlatformActivityState,
    ) -> Result<(), PlatformError> {
        self.lock().surface_mut(handle)?.state = state;
        Ok(())
    }

    /// Drop a surface entirely.
    pub fn forget(&self, handle: &PlatformHandle) {
        self.lock().surfaces.retain(|s| &s.handle != handle);
    }

    /// Fail the next call to `method` with `error`.
    pub fn fail_next(&self, method: PlatformMethod, error: PlatformError) {
        self.lock().next_failure = Some((method, error));
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Current surfaces.
    #[must_use]
    pub fn surfaces(&self) -> Vec<PlatformActivity> {
        self.lock().surfaces.clone()
    }

    /// The surface for a client activity id.
    #[must_use]
    pub fn surface_for(&self, activity_id: &str) -> Option<PlatformActivity> {
        self.lock()
            .surfaces
            .iter()
            .find(|s| s.attributes.activity_id == activity_id)
            .cloned()
    }

    /// Alerts delivered to `handle`, oldest first.
    #[must_use]
    pub fn alerts(&self, handle: &PlatformHandle) -> Vec<AlertConfig> {
        self.lock()
            .alerts
            .iter()
            .filter(|(h, _)| h == handle)
            .map(|(_, alert)| alert.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActivityPlatform for InMemoryPlatform {
    fn availability(&self) -> Availability {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn request(&self, request: ActivityRequest) -> Result<PlatformHandle, PlatformError> {
        let mut inner = self.lock();
        inner.record_call(PlatformMethod::Request)?;
        let handle = inner.allocate_handle();
        inner.surfaces.push(PlatformActivity {
            handle: handle.clone(),
            attributes: request.attributes,
            content: request.content,
            state: PlatformActivityState::Active,
        });
        Ok(handle)
    }

    async fn update(
        &self,
        handle: &PlatformHandle,
        content: ContentState,
        alert: Option<AlertConfig>,
    ) -> Result<(), PlatformError> {
        let mut inner = self.lock();
        inner.record_call(PlatformMethod::Update)?;
        let surface = inner.surface_mut(handle)?;
        if !surface.state.is_live() {
            return Err(PlatformError::Rejected(format!(
                "activity {handle} is no longer active"
            )));
        }
        surface.content = content;
        if let Some(alert) = alert {
            inner.alerts.push((handle.clone(), alert));
        }
        Ok(())
    }

    async fn end(
        &self,
        handle: &PlatformHandle,
        content: Option<ContentState>,
        policy: DismissalPolicy,
    ) -> Result<(), PlatformError> {
        let mut inner = self.lock();
        inner.record_call(PlatformMethod::End)?;
        let surface = inner.surface_mut(handle)?;
        if let Some(content) = content {
            surface.content = content;
        }
        surface.state = PlatformActivityState::Ended;
        if policy == DismissalPolicy::Immediate {
            inner.surfaces.retain(|s| &s.handle != handle);
        }
        Ok(())
    }

    async fn activities(&self) -> Result<Vec<PlatformActivity>, PlatformError> {
        let mut inner = self.lock();
        inner.record_call(PlatformMethod::Activities)?;
        Ok(inner.surfaces.clone())
    }
}
