use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::admission::alerts::{
    AlertError, AlertPublisher, AudienceSource, ProbabilityAlert, ProbabilityChangeDetector,
};
use crate::workflows::admission::cache::{KeyValueStore, StoreError, StoredValue};
use crate::workflows::admission::domain::{
    AgeCohortCapacity, AgeGroup, CohortKey, FacilityId, ProbabilitySnapshot, TurnoverEvent,
};
use crate::workflows::admission::extractor::FactorExtractor;
use crate::workflows::admission::repository::{
    CohortRepository, RepositoryError, SnapshotStore, UpsertOutcome,
};
use crate::workflows::admission::scoring::{Factors, ProbabilityEngine, ScoringConfig};
use crate::workflows::admission::service::ProbabilityService;

/// Mid-March, the peak of the intake season.
pub(super) fn march() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn example_factors() -> Factors {
    Factors {
        queue_position: 5,
        total_waiting: 20,
        class_capacity: 30,
        current_enroll: 25,
        historical_to_rate: 1.0,
        priority: 1,
        bonus_points: 2.0,
    }
}

pub(super) fn engine() -> ProbabilityEngine {
    ProbabilityEngine::new(ScoringConfig::default())
}

pub(super) fn cohort() -> CohortKey {
    CohortKey::new("fac-sunflower", "age_2")
}

pub(super) fn capacity(
    key: &CohortKey,
    capacity: i64,
    current_enrollment: i64,
    waiting_count: i64,
) -> AgeCohortCapacity {
    AgeCohortCapacity {
        facility_id: key.facility_id.clone(),
        age_group: key.age_group.clone(),
        capacity,
        current_enrollment,
        waiting_count,
    }
}

pub(super) fn turnover(key: &CohortKey, days_ago: i64, seats_freed: u32) -> TurnoverEvent {
    TurnoverEvent {
        facility_id: key.facility_id.clone(),
        age_group: key.age_group.clone(),
        occurred_at: march() - Duration::days(days_ago),
        seats_freed,
    }
}

pub(super) fn snapshot(key: &CohortKey, probability: f64, days_ago: i64) -> ProbabilitySnapshot {
    ProbabilitySnapshot {
        facility_id: key.facility_id.clone(),
        age_group: key.age_group.clone(),
        probability,
        grade: engine().grade(probability),
        calculated_at: march() - Duration::days(days_ago),
    }
}

/// Cohort with 30 seats, 25 enrolled, 20 waiting and 12 seats freed over four events.
pub(super) fn seeded_cohorts() -> Arc<MemoryCohorts> {
    let cohorts = Arc::new(MemoryCohorts::default());
    let key = cohort();
    cohorts.insert(capacity(&key, 30, 25, 20));
    for (days_ago, seats) in [(20, 3), (90, 4), (200, 2), (300, 3)] {
        cohorts.push_event(turnover(&key, days_ago, seats));
    }
    cohorts
}

pub(super) fn build_service(
    cohorts: Arc<MemoryCohorts>,
    snapshots: Arc<MemorySnapshots>,
) -> ProbabilityService<MemoryCohorts, MemorySnapshots> {
    ProbabilityService::new(FactorExtractor::new(cohorts), snapshots, engine())
}

pub(super) fn build_detector(
    store: Arc<MemoryStore>,
    audience: Arc<MemoryAudience>,
    alerts: Arc<MemoryAlerts>,
) -> ProbabilityChangeDetector<MemoryStore, MemoryAudience, MemoryAlerts> {
    ProbabilityChangeDetector::new(store, audience, alerts)
}

#[derive(Default)]
pub(super) struct MemoryCohorts {
    capacities: Mutex<BTreeMap<CohortKey, AgeCohortCapacity>>,
    events: Mutex<Vec<TurnoverEvent>>,
}

impl MemoryCohorts {
    pub(super) fn insert(&self, capacity: AgeCohortCapacity) {
        self.capacities
            .lock()
            .expect("cohort mutex poisoned")
            .insert(capacity.key(), capacity);
    }

    pub(super) fn push_event(&self, event: TurnoverEvent) {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event);
    }
}

impl CohortRepository for MemoryCohorts {
    fn fetch_age_cohort_capacity(
        &self,
        key: &CohortKey,
    ) -> Result<Option<AgeCohortCapacity>, RepositoryError> {
        let guard = self.capacities.lock().expect("cohort mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn fetch_turnover_events(
        &self,
        key: &CohortKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<TurnoverEvent>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| {
                event.facility_id == key.facility_id
                    && event.age_group == key.age_group
                    && event.occurred_at >= since
            })
            .cloned()
            .collect())
    }

    fn list_cohorts(&self) -> Result<Vec<CohortKey>, RepositoryError> {
        let guard = self.capacities.lock().expect("cohort mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }
}

pub(super) struct UnavailableCohorts;

impl CohortRepository for UnavailableCohorts {
    fn fetch_age_cohort_capacity(
        &self,
        _key: &CohortKey,
    ) -> Result<Option<AgeCohortCapacity>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_turnover_events(
        &self,
        _key: &CohortKey,
        _since: DateTime<Utc>,
    ) -> Result<Vec<TurnoverEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_cohorts(&self) -> Result<Vec<CohortKey>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySnapshots {
    records: Mutex<HashMap<CohortKey, ProbabilitySnapshot>>,
}

impl MemorySnapshots {
    pub(super) fn with(snapshots: Vec<ProbabilitySnapshot>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut guard = store.records.lock().expect("snapshot mutex poisoned");
            for snapshot in snapshots {
                guard.insert(snapshot.key(), snapshot);
            }
        }
        Arc::new(store)
    }

    pub(super) fn get(&self, key: &CohortKey) -> Option<ProbabilitySnapshot> {
        self.records
            .lock()
            .expect("snapshot mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl SnapshotStore for MemorySnapshots {
    fn fetch_previous_snapshot(
        &self,
        key: &CohortKey,
    ) -> Result<Option<ProbabilitySnapshot>, RepositoryError> {
        Ok(self.get(key))
    }

    fn upsert_if_newer(
        &self,
        snapshot: ProbabilitySnapshot,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut guard = self.records.lock().expect("snapshot mutex poisoned");
        match guard.get(&snapshot.key()) {
            Some(current) if current.calculated_at > snapshot.calculated_at => {
                Ok(UpsertOutcome::Superseded {
                    current: current.clone(),
                })
            }
            _ => match guard.insert(snapshot.key(), snapshot) {
                Some(previous) => Ok(UpsertOutcome::Replaced { previous }),
                None => Ok(UpsertOutcome::Inserted),
            },
        }
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub(super) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let mut guard = self.entries.lock().expect("store mutex poisoned");
        let Some(stored) = guard.get(key).cloned() else {
            return Ok(None);
        };
        if let Some(expires_at) = stored.expires_at {
            if Utc::now() >= expires_at {
                guard.remove(key);
                return Ok(None);
            }
        }
        Ok(Some(stored))
    }

    fn set(&self, key: &str, value: String, ttl: Option<StdDuration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Utc::now() + Duration::from_std(ttl).unwrap_or_default());
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryAudience {
    names: Mutex<HashMap<FacilityId, String>>,
    users: Mutex<HashMap<(FacilityId, AgeGroup), Vec<String>>>,
}

impl MemoryAudience {
    pub(super) fn for_cohort(key: &CohortKey, name: &str, users: &[&str]) -> Arc<Self> {
        let audience = Self::default();
        audience
            .names
            .lock()
            .expect("audience mutex poisoned")
            .insert(key.facility_id.clone(), name.to_string());
        audience
            .users
            .lock()
            .expect("audience mutex poisoned")
            .insert(
                (key.facility_id.clone(), key.age_group.clone()),
                users.iter().map(|user| user.to_string()).collect(),
            );
        Arc::new(audience)
    }
}

impl AudienceSource for MemoryAudience {
    fn facility_name(&self, facility_id: &FacilityId) -> Result<Option<String>, AlertError> {
        let guard = self.names.lock().expect("audience mutex poisoned");
        Ok(guard.get(facility_id).cloned())
    }

    fn interested_users(&self, key: &CohortKey) -> Result<Vec<String>, AlertError> {
        let guard = self.users.lock().expect("audience mutex poisoned");
        Ok(guard
            .get(&(key.facility_id.clone(), key.age_group.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(super) struct MemoryAlerts {
    events: Mutex<Vec<ProbabilityAlert>>,
}

impl MemoryAlerts {
    pub(super) fn events(&self) -> Vec<ProbabilityAlert> {
        self.events.lock().expect("alert mutex poisoned").clone()
    }
}

impl AlertPublisher for MemoryAlerts {
    fn publish(&self, alert: ProbabilityAlert) -> Result<(), AlertError> {
        self.events
            .lock()
            .expect("alert mutex poisoned")
            .push(alert);
        Ok(())
    }
}

/// Delivers to everyone except one user.
pub(super) struct FlakyAlerts {
    pub(super) failing_user: &'static str,
    pub(super) delivered: MemoryAlerts,
}

impl AlertPublisher for FlakyAlerts {
    fn publish(&self, alert: ProbabilityAlert) -> Result<(), AlertError> {
        if alert.user_id == self.failing_user {
            return Err(AlertError::Transport(format!(
                "no device registered for {}",
                alert.user_id
            )));
        }
        self.delivered.publish(alert)
    }
}

pub(super) struct OfflineAlerts;

impl AlertPublisher for OfflineAlerts {
    fn publish(&self, _alert: ProbabilityAlert) -> Result<(), AlertError> {
        Err(AlertError::Transport("push gateway offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
