use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{futures::Notified, Notify};

use super::dto::KeyStatusView;
use super::model::{ApiKey, KeyId, KeyStatus, ModelLimits};
use super::quota::next_utc_midnight;
use crate::domain::jobs::JobId;
use crate::domain::shared::Clock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyPoolError {
    #[error("key {0} not found")]
    NotFound(KeyId),
    #[error("key {key_id} is reserved by job {holder}")]
    Reserved { key_id: KeyId, holder: JobId },
    #[error("a key ending in {0} is already registered")]
    Duplicate(String),
}

/// An exclusive claim on one key for one in-flight call.
/// Must be handed back through [`KeyPool::complete`] or [`KeyPool::release`].
#[derive(Clone)]
pub struct KeyLease {
    pub key_id: KeyId,
    pub label: String,
    pub model: String,
    pub secret: String,
}

impl std::fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLease")
            .field("key_id", &self.key_id)
            .field("label", &self.label)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl From<&ApiKey> for KeyLease {
    fn from(key: &ApiKey) -> Self {
        Self {
            key_id: key.id,
            label: key.label.clone(),
            model: key.model.clone(),
            secret: key.secret.clone(),
        }
    }
}

/// How the provider answered a call made under a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Audio came back; the call counts against the key's quota.
    Served,
    /// The call failed without saying anything about the key.
    Failed,
    /// The provider rejected the key itself.
    Demoted { status: KeyStatus, message: String },
    /// The provider throttled the key for `cooldown`.
    RateLimited {
        cooldown: std::time::Duration,
        message: String,
    },
}

/// What a job can expect if it asks for a key right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAvailability {
    /// A key can be acquired immediately.
    Ready,
    /// Every usable key is reserved by another job; one frees up when its call returns.
    Contended,
    /// Every usable key is cooling down or exhausted; the earliest frees up at `until`.
    CoolingDown { until: DateTime<Utc> },
    /// Nothing in the pool can ever serve this request without operator action.
    Unavailable,
}

struct PoolState {
    keys: Vec<ApiKey>,
    reservations: HashMap<KeyId, JobId>,
}

/// Holds every key plus the reservation map behind one lock, so each selection,
/// reservation and counter update is observed atomically.
pub struct KeyPool {
    state: Mutex<PoolState>,
    clock: Arc<dyn Clock>,
    allow_invalid_fallback: bool,
    released: Notify,
}

fn in_cooldown(key: &ApiKey, limits: &ModelLimits, now: DateTime<Utc>) -> bool {
    key.quota.is_in_cooldown(limits, now) || key.cooldown_until.map_or(false, |until| until > now)
}

fn is_exhausted(key: &ApiKey, limits: &ModelLimits, now: DateTime<Utc>) -> bool {
    key.quota.is_exhausted(limits, now)
}

fn block_reason(key: &ApiKey) -> Option<String> {
    if !key.is_active {
        return Some("disabled by operator".to_string());
    }
    let reason = match key.status {
        KeyStatus::Invalid => "invalid credentials",
        KeyStatus::Suspended => "suspended by provider",
        KeyStatus::NoCredits => "no credits remaining",
        _ => return None,
    };
    Some(match &key.status_message {
        Some(message) => format!("{}: {}", reason, message),
        None => reason.to_string(),
    })
}

/// Availability under the limits of the key's own registered model.
fn is_available(key: &ApiKey, now: DateTime<Utc>) -> bool {
    let limits = key.limits();
    block_reason(key).is_none() && !in_cooldown(key, &limits, now) && !is_exhausted(key, &limits, now)
}

/// Earliest instant a cooling-down or exhausted key becomes usable again, `None` if usable now.
fn free_at(key: &ApiKey, limits: &ModelLimits, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut until: Option<DateTime<Utc>> = None;
    if key.quota.is_in_cooldown(limits, now) {
        until = key.quota.rpm_window_end(now);
    }
    if let Some(provider) = key.cooldown_until.filter(|u| *u > now) {
        until = Some(until.map_or(provider, |u| u.max(provider)));
    }
    if is_exhausted(key, limits, now) {
        let midnight = next_utc_midnight(now);
        until = Some(until.map_or(midnight, |u| u.max(midnight)));
    }
    until
}

impl PoolState {
    fn find(&self, key_id: KeyId) -> Option<&ApiKey> {
        self.keys.iter().find(|key| key.id == key_id)
    }

    fn find_mut(&mut self, key_id: KeyId) -> Result<&mut ApiKey, KeyPoolError> {
        self.keys
            .iter_mut()
            .find(|key| key.id == key_id)
            .ok_or(KeyPoolError::NotFound(key_id))
    }

    fn reserved_by_other(&self, key_id: KeyId, job_id: JobId) -> bool {
        self.reservations
            .get(&key_id)
            .map_or(false, |holder| *holder != job_id)
    }

    fn selectable_status(status: KeyStatus, allow_invalid: bool) -> bool {
        match status {
            KeyStatus::Valid | KeyStatus::RateLimited | KeyStatus::Unknown => true,
            KeyStatus::Invalid => allow_invalid,
            KeyStatus::Suspended | KeyStatus::NoCredits => false,
        }
    }

    fn eligible(
        &self,
        key: &ApiKey,
        exclude: &HashSet<KeyId>,
        job_id: JobId,
        limits: &ModelLimits,
        now: DateTime<Utc>,
    ) -> bool {
        key.is_active
            && !exclude.contains(&key.id)
            && !self.reserved_by_other(key.id, job_id)
            && !in_cooldown(key, limits, now)
            && !is_exhausted(key, limits, now)
    }

    /// Three tiers: proven keys by lowest lifetime usage, then never-validated keys,
    /// then (optionally) keys previously marked invalid. First match wins ties.
    /// A rate-limited key has proven its credentials and sits in the first tier once
    /// its cooldown lapses.
    fn select(
        &self,
        exclude: &HashSet<KeyId>,
        job_id: JobId,
        limits: &ModelLimits,
        now: DateTime<Utc>,
        allow_invalid: bool,
    ) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, key) in self.keys.iter().enumerate() {
            if matches!(key.status, KeyStatus::Valid | KeyStatus::RateLimited)
                && self.eligible(key, exclude, job_id, limits, now)
                && best.map_or(true, |b| key.total_requests < self.keys[b].total_requests)
            {
                best = Some(index);
            }
        }
        if best.is_some() {
            return best;
        }

        if let Some(index) = self.keys.iter().position(|key| {
            key.status == KeyStatus::Unknown && self.eligible(key, exclude, job_id, limits, now)
        }) {
            return Some(index);
        }

        if allow_invalid {
            return self.keys.iter().position(|key| {
                key.status == KeyStatus::Invalid && self.eligible(key, exclude, job_id, limits, now)
            });
        }

        None
    }

    fn view(&self, key: &ApiKey, now: DateTime<Utc>) -> KeyStatusView {
        let limits = key.limits();
        KeyStatusView {
            id: key.id,
            label: key.label.clone(),
            model: key.model.clone(),
            masked_secret: key.masked_secret(),
            status: key.status,
            is_active: key.is_active,
            available: is_available(key, now),
            in_cooldown: in_cooldown(key, &limits, now),
            is_exhausted: is_exhausted(key, &limits, now),
            block_reason: block_reason(key),
            usage: key.quota.usage(&limits, now),
            total_requests: key.total_requests,
            reserved_by: self.reservations.get(&key.id).copied(),
            cooldown_until: key.cooldown_until.filter(|until| *until > now),
            last_used_at: key.last_used_at,
        }
    }
}

impl KeyPool {
    pub fn new(keys: Vec<ApiKey>, clock: Arc<dyn Clock>, allow_invalid_fallback: bool) -> Self {
        Self {
            state: Mutex::new(PoolState {
                keys,
                reservations: HashMap::new(),
            }),
            clock,
            allow_invalid_fallback,
            released: Notify::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_secret(&self, secret: &str) -> bool {
        self.state.lock().keys.iter().any(|key| key.secret == secret)
    }

    pub fn add_key(&self, key: ApiKey) {
        tracing::info!(key_id = %key.id, label = %key.label, model = %key.model, "Key added to pool");
        self.state.lock().keys.push(key);
    }

    /// Adds every key or none: a secret already in the pool (or repeated in `keys`) rejects the batch.
    pub fn add_keys(&self, keys: Vec<ApiKey>) -> Result<(), KeyPoolError> {
        let mut state = self.state.lock();
        let mut seen = HashSet::new();
        for key in &keys {
            if !seen.insert(key.secret.as_str())
                || state.keys.iter().any(|existing| existing.secret == key.secret)
            {
                let chars: Vec<char> = key.secret.chars().collect();
                let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
                return Err(KeyPoolError::Duplicate(tail));
            }
        }
        for key in keys {
            tracing::info!(key_id = %key.id, label = %key.label, model = %key.model, "Key added to pool");
            state.keys.push(key);
        }
        Ok(())
    }

    pub fn remove_key(&self, key_id: KeyId) -> Result<ApiKey, KeyPoolError> {
        let removed = {
            let mut state = self.state.lock();
            let index = state
                .keys
                .iter()
                .position(|key| key.id == key_id)
                .ok_or(KeyPoolError::NotFound(key_id))?;
            state.reservations.remove(&key_id);
            state.keys.remove(index)
        };
        self.released.notify_waiters();
        tracing::info!(key_id = %key_id, "Key removed from pool");
        Ok(removed)
    }

    pub fn set_active(&self, key_id: KeyId, is_active: bool) -> Result<(), KeyPoolError> {
        self.state.lock().find_mut(key_id)?.is_active = is_active;
        tracing::info!(key_id = %key_id, is_active, "Key activation changed");
        Ok(())
    }

    pub fn set_label(&self, key_id: KeyId, label: String) -> Result<(), KeyPoolError> {
        self.state.lock().find_mut(key_id)?.label = label;
        Ok(())
    }

    pub fn is_available(&self, key_id: KeyId) -> Result<bool, KeyPoolError> {
        let state = self.state.lock();
        let key = state.find(key_id).ok_or(KeyPoolError::NotFound(key_id))?;
        Ok(is_available(key, self.clock.now()))
    }

    pub fn block_reason(&self, key_id: KeyId) -> Result<Option<String>, KeyPoolError> {
        let state = self.state.lock();
        let key = state.find(key_id).ok_or(KeyPoolError::NotFound(key_id))?;
        Ok(block_reason(key))
    }

    /// Read-only selection for a call on `model`. Prefer [`KeyPool::acquire`], which selects
    /// and reserves atomically.
    pub fn select_key(&self, exclude: &HashSet<KeyId>, job_id: JobId, model: &str) -> Option<KeyId> {
        let state = self.state.lock();
        let limits = ModelLimits::for_model(model);
        state
            .select(exclude, job_id, &limits, self.clock.now(), self.allow_invalid_fallback)
            .map(|index| state.keys[index].id)
    }

    pub fn reserve(&self, key_id: KeyId, job_id: JobId) -> Result<(), KeyPoolError> {
        let mut state = self.state.lock();
        if state.find(key_id).is_none() {
            return Err(KeyPoolError::NotFound(key_id));
        }
        if let Some(holder) = state.reservations.get(&key_id) {
            if *holder != job_id {
                return Err(KeyPoolError::Reserved {
                    key_id,
                    holder: *holder,
                });
            }
        }
        state.reservations.insert(key_id, job_id);
        Ok(())
    }

    /// Releases the reservation if `job_id` holds it. Returns whether anything was released.
    pub fn release(&self, key_id: KeyId, job_id: JobId) -> bool {
        let released = {
            let mut state = self.state.lock();
            if state.reservations.get(&key_id) == Some(&job_id) {
                state.reservations.remove(&key_id);
                true
            } else {
                false
            }
        };
        if released {
            self.released.notify_waiters();
        }
        released
    }

    /// Resolves the next time any reservation is released or a key is removed.
    pub fn released(&self) -> Notified<'_> {
        self.released.notified()
    }

    /// Selects a key for a call on `model` and reserves it for `job_id` under a single lock.
    /// Quota is judged against `model`'s limits, since that is the model the call goes out on.
    pub fn acquire(&self, exclude: &HashSet<KeyId>, job_id: JobId, model: &str) -> Option<KeyLease> {
        let mut state = self.state.lock();
        let limits = ModelLimits::for_model(model);
        let index = state.select(exclude, job_id, &limits, self.clock.now(), self.allow_invalid_fallback)?;
        let lease = KeyLease::from(&state.keys[index]);
        state.reservations.insert(lease.key_id, job_id);
        Some(lease)
    }

    /// Re-takes a specific key for `job_id` if it is still usable on `model` and not held elsewhere.
    pub fn try_acquire(&self, key_id: KeyId, job_id: JobId, model: &str) -> Option<KeyLease> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let limits = ModelLimits::for_model(model);
        let key = state.find(key_id)?;
        if !PoolState::selectable_status(key.status, self.allow_invalid_fallback)
            || !state.eligible(key, &HashSet::new(), job_id, &limits, now)
        {
            return None;
        }
        let lease = KeyLease::from(key);
        state.reservations.insert(key_id, job_id);
        Some(lease)
    }

    /// Credentials for an out-of-band call (validation) without reserving the key.
    pub fn credentials(&self, key_id: KeyId) -> Result<KeyLease, KeyPoolError> {
        let state = self.state.lock();
        state
            .find(key_id)
            .map(KeyLease::from)
            .ok_or(KeyPoolError::NotFound(key_id))
    }

    pub fn availability(&self, exclude: &HashSet<KeyId>, job_id: JobId, model: &str) -> KeyAvailability {
        let state = self.state.lock();
        let now = self.clock.now();
        let limits = ModelLimits::for_model(model);

        let mut contended = false;
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut any_candidate = false;

        for key in state.keys.iter().filter(|key| {
            key.is_active
                && PoolState::selectable_status(key.status, self.allow_invalid_fallback)
                && !exclude.contains(&key.id)
        }) {
            any_candidate = true;
            match (state.reserved_by_other(key.id, job_id), free_at(key, &limits, now)) {
                (false, None) => return KeyAvailability::Ready,
                (true, None) => contended = true,
                (_, Some(at)) => earliest = Some(earliest.map_or(at, |e| e.min(at))),
            }
        }

        if !any_candidate {
            KeyAvailability::Unavailable
        } else if contended {
            KeyAvailability::Contended
        } else {
            earliest.map_or(KeyAvailability::Unavailable, |until| {
                KeyAvailability::CoolingDown { until }
            })
        }
    }

    /// Settles a lease: applies what the provider said about the key and releases the
    /// reservation in the same critical section, so no other job can take the key
    /// between the release and the counter update.
    pub fn complete(
        &self,
        key_id: KeyId,
        job_id: JobId,
        outcome: CallOutcome,
    ) -> Result<(), KeyPoolError> {
        let now = self.clock.now();
        let released = {
            let mut state = self.state.lock();
            let key = state.find_mut(key_id)?;
            match outcome {
                CallOutcome::Served => Self::count_success(key, now),
                CallOutcome::Failed => {}
                CallOutcome::Demoted { status, message } => {
                    Self::apply_status(key, status, Some(message))
                }
                CallOutcome::RateLimited { cooldown, message } => {
                    Self::park(key, cooldown, message, now)
                }
            }
            if state.reservations.get(&key_id) == Some(&job_id) {
                state.reservations.remove(&key_id);
                true
            } else {
                false
            }
        };
        if released {
            self.released.notify_waiters();
        }
        Ok(())
    }

    /// Counts a successful call against the key's quota and marks it proven.
    pub fn record_success(&self, key_id: KeyId) -> Result<(), KeyPoolError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Self::count_success(state.find_mut(key_id)?, now);
        Ok(())
    }

    fn count_success(key: &mut ApiKey, now: DateTime<Utc>) {
        key.quota.record_use(now);
        key.total_requests += 1;
        key.last_used_at = Some(now);
        key.status = KeyStatus::Valid;
        key.status_message = None;
        key.cooldown_until = None;
    }

    pub fn set_status(
        &self,
        key_id: KeyId,
        status: KeyStatus,
        message: Option<String>,
    ) -> Result<(), KeyPoolError> {
        let mut state = self.state.lock();
        Self::apply_status(state.find_mut(key_id)?, status, message);
        Ok(())
    }

    fn apply_status(key: &mut ApiKey, status: KeyStatus, message: Option<String>) {
        if key.status != status {
            tracing::warn!(
                key_id = %key.id,
                label = %key.label,
                from = %key.status,
                to = %status,
                "Key status changed"
            );
        }
        key.status = status;
        key.status_message = message;
    }

    pub fn mark_validated(&self, key_id: KeyId) -> Result<(), KeyPoolError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let key = state.find_mut(key_id)?;
        key.status = KeyStatus::Valid;
        key.status_message = None;
        key.last_validated_at = Some(now);
        Ok(())
    }

    /// Parks a key for a provider-requested cooldown.
    pub fn mark_rate_limited(
        &self,
        key_id: KeyId,
        cooldown: std::time::Duration,
        message: String,
    ) -> Result<(), KeyPoolError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Self::park(state.find_mut(key_id)?, cooldown, message, now);
        Ok(())
    }

    fn park(key: &mut ApiKey, cooldown: std::time::Duration, message: String, now: DateTime<Utc>) {
        let until = now + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::seconds(60));
        key.status = KeyStatus::RateLimited;
        key.status_message = Some(message);
        key.cooldown_until = Some(until);
        tracing::warn!(key_id = %key.id, label = %key.label, cooldown_until = %until, "Key rate limited by provider");
    }

    pub fn reset_one(&self, key_id: KeyId) -> Result<(), KeyPoolError> {
        {
            let mut state = self.state.lock();
            Self::reset_key(state.find_mut(key_id)?);
            state.reservations.remove(&key_id);
        }
        self.released.notify_waiters();
        tracing::info!(key_id = %key_id, "Key reset");
        Ok(())
    }

    /// Resets every key in the pool and returns how many were reset.
    pub fn reset_all(&self) -> usize {
        let count = {
            let mut state = self.state.lock();
            state.keys.iter_mut().for_each(Self::reset_key);
            state.reservations.clear();
            state.keys.len()
        };
        self.released.notify_waiters();
        tracing::info!(count, "All keys reset");
        count
    }

    fn reset_key(key: &mut ApiKey) {
        key.quota.reset();
        key.cooldown_until = None;
        if key.status.is_blocking() || key.status == KeyStatus::RateLimited {
            key.status = KeyStatus::Unknown;
        }
        key.status_message = None;
    }

    pub fn status_view(&self, key_id: KeyId) -> Result<KeyStatusView, KeyPoolError> {
        let state = self.state.lock();
        let key = state.find(key_id).ok_or(KeyPoolError::NotFound(key_id))?;
        Ok(state.view(key, self.clock.now()))
    }

    pub fn status_views(&self) -> Vec<KeyStatusView> {
        let state = self.state.lock();
        let now = self.clock.now();
        state.keys.iter().map(|key| state.view(key, now)).collect()
    }

    pub fn available_count(&self) -> usize {
        let state = self.state.lock();
        let now = self.clock.now();
        state.keys.iter().filter(|key| is_available(key, now)).count()
    }

    pub fn holder(&self, key_id: KeyId) -> Option<JobId> {
        self.state.lock().reservations.get(&key_id).copied()
    }

    pub fn snapshot(&self) -> Vec<ApiKey> {
        self.state.lock().keys.clone()
    }
}
