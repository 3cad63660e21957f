use admission_odds::config::OddsConfig;
use admission_odds::workflows::admission::{
    AgeCohortCapacity, AgeGroup, AlertError, AlertPublisher, AudienceSource, CohortKey,
    CohortRepository, FacilityId, FactorExtractor, KeyValueStore, ProbabilityAlert,
    ProbabilityChangeDetector, ProbabilityEngine, ProbabilityService, ProbabilitySnapshot,
    RecomputeScheduler, RepositoryError, SnapshotStore, StoreError, StoredValue, TurnoverEvent,
    UpsertOutcome,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryProbabilityService =
    ProbabilityService<InMemoryCohortRepository, InMemorySnapshotStore>;

pub(crate) type InMemoryChangeDetector =
    ProbabilityChangeDetector<InMemoryKeyValueStore, InMemoryAudience, InMemoryAlertPublisher>;

pub(crate) type InMemoryScheduler =
    RecomputeScheduler<InMemoryCohortRepository, InMemorySnapshotStore, InMemoryChangeDetector>;

/// Everything the server and demo share: stores, service and recompute scheduler.
pub(crate) struct InMemoryStack {
    pub(crate) cohorts: Arc<InMemoryCohortRepository>,
    pub(crate) audience: Arc<InMemoryAudience>,
    pub(crate) alerts: Arc<InMemoryAlertPublisher>,
    pub(crate) service: Arc<InMemoryProbabilityService>,
    pub(crate) scheduler: Arc<InMemoryScheduler>,
}

impl InMemoryStack {
    pub(crate) fn build(config: &OddsConfig) -> Self {
        let cohorts = Arc::new(InMemoryCohortRepository::default());
        let snapshots = Arc::new(InMemorySnapshotStore::default());
        let store = Arc::new(InMemoryKeyValueStore::default());
        let audience = Arc::new(InMemoryAudience::default());
        let alerts = Arc::new(InMemoryAlertPublisher::default());

        let extractor = FactorExtractor::new(cohorts.clone())
            .with_min_turnover_samples(config.min_turnover_samples);
        let service = Arc::new(ProbabilityService::new(
            extractor,
            snapshots,
            ProbabilityEngine::new(config.scoring.clone()),
        ));
        let detector = Arc::new(
            ProbabilityChangeDetector::new(store, audience.clone(), alerts.clone())
                .with_threshold(config.alert_threshold)
                .with_cooldown(Duration::minutes(config.alert_cooldown_minutes)),
        );
        let scheduler = Arc::new(RecomputeScheduler::new(
            service.clone(),
            cohorts.clone(),
            detector,
            config.recompute.clone(),
        ));

        Self {
            cohorts,
            audience,
            alerts,
            service,
            scheduler,
        }
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCohortRepository {
    capacities: Arc<Mutex<BTreeMap<CohortKey, AgeCohortCapacity>>>,
    events: Arc<Mutex<Vec<TurnoverEvent>>>,
}

impl InMemoryCohortRepository {
    pub(crate) fn upsert_capacity(&self, capacity: AgeCohortCapacity) {
        let mut guard = self.capacities.lock().expect("repository mutex poisoned");
        guard.insert(capacity.key(), capacity);
    }

    pub(crate) fn record_turnover(&self, event: TurnoverEvent) {
        let mut guard = self.events.lock().expect("repository mutex poisoned");
        guard.push(event);
    }

    /// Move children out of (negative) or into (positive) a cohort.
    pub(crate) fn adjust_enrollment(&self, key: &CohortKey, delta: i64) {
        let mut guard = self.capacities.lock().expect("repository mutex poisoned");
        if let Some(capacity) = guard.get_mut(key) {
            capacity.current_enrollment = (capacity.current_enrollment + delta).max(0);
        }
    }
}

impl CohortRepository for InMemoryCohortRepository {
    fn fetch_age_cohort_capacity(
        &self,
        key: &CohortKey,
    ) -> Result<Option<AgeCohortCapacity>, RepositoryError> {
        let guard = self.capacities.lock().expect("repository mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn fetch_turnover_events(
        &self,
        key: &CohortKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<TurnoverEvent>, RepositoryError> {
        let guard = self.events.lock().expect("repository mutex poisoned");
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
        let guard = self.capacities.lock().expect("repository mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySnapshotStore {
    records: Arc<Mutex<HashMap<CohortKey, ProbabilitySnapshot>>>,
}

impl SnapshotStore for InMemorySnapshotStore {
    fn fetch_previous_snapshot(
        &self,
        key: &CohortKey,
    ) -> Result<Option<ProbabilitySnapshot>, RepositoryError> {
        let guard = self.records.lock().expect("snapshot mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn upsert_if_newer(
        &self,
        snapshot: ProbabilitySnapshot,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut guard = self.records.lock().expect("snapshot mutex poisoned");
        let key = snapshot.key();
        if let Some(current) = guard.get(&key) {
            if current.calculated_at > snapshot.calculated_at {
                return Ok(UpsertOutcome::Superseded {
                    current: current.clone(),
                });
            }
        }
        Ok(match guard.insert(key, snapshot) {
            Some(previous) => UpsertOutcome::Replaced { previous },
            None => UpsertOutcome::Inserted,
        })
    }
}

/// Process-local key-value store with lazy expiry on read.
#[derive(Default, Clone)]
pub(crate) struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, StoredValue>>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let mut guard = self.entries.lock().expect("store mutex poisoned");
        let expired = matches!(
            guard.get(key),
            Some(StoredValue { expires_at: Some(expires_at), .. }) if *expires_at <= Utc::now()
        );
        if expired {
            guard.remove(key);
            return Ok(None);
        }
        Ok(guard.get(key).cloned())
    }

    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = match ttl {
            Some(ttl) => Some(
                Utc::now()
                    + Duration::from_std(ttl)
                        .map_err(|err| StoreError::Unavailable(err.to_string()))?,
            ),
            None => None,
        };
        let mut guard = self.entries.lock().expect("store mutex poisoned");
        guard.insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAudience {
    names: Arc<Mutex<HashMap<FacilityId, String>>>,
    interested: Arc<Mutex<HashMap<CohortKey, Vec<String>>>>,
}

impl InMemoryAudience {
    pub(crate) fn name_facility(&self, facility_id: &FacilityId, name: &str) {
        let mut guard = self.names.lock().expect("audience mutex poisoned");
        guard.insert(facility_id.clone(), name.to_string());
    }

    pub(crate) fn follow(&self, key: &CohortKey, user_id: &str) {
        let mut guard = self.interested.lock().expect("audience mutex poisoned");
        guard
            .entry(key.clone())
            .or_default()
            .push(user_id.to_string());
    }
}

impl AudienceSource for InMemoryAudience {
    fn facility_name(&self, facility_id: &FacilityId) -> Result<Option<String>, AlertError> {
        let guard = self.names.lock().expect("audience mutex poisoned");
        Ok(guard.get(facility_id).cloned())
    }

    fn interested_users(&self, key: &CohortKey) -> Result<Vec<String>, AlertError> {
        let guard = self.interested.lock().expect("audience mutex poisoned");
        Ok(guard.get(key).cloned().unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAlertPublisher {
    events: Arc<Mutex<Vec<ProbabilityAlert>>>,
}

impl AlertPublisher for InMemoryAlertPublisher {
    fn publish(&self, alert: ProbabilityAlert) -> Result<(), AlertError> {
        let mut guard = self.events.lock().expect("alert mutex poisoned");
        guard.push(alert);
        Ok(())
    }
}

impl InMemoryAlertPublisher {
    pub(crate) fn events(&self) -> Vec<ProbabilityAlert> {
        self.events.lock().expect("alert mutex poisoned").clone()
    }
}

struct SeedCohort {
    facility: &'static str,
    name: &'static str,
    age_group: &'static str,
    capacity: i64,
    enrolled: i64,
    waiting: i64,
    /// (days before `as_of`, seats freed)
    turnover: &'static [(i64, u32)],
    followers: &'static [&'static str],
}

const DEMO_POPULATION: &[SeedCohort] = &[
    SeedCohort {
        facility: "fac-sunflower",
        name: "Sunflower Daycare",
        age_group: "age_2",
        capacity: 30,
        enrolled: 25,
        waiting: 20,
        turnover: &[(20, 3), (90, 4), (200, 2), (300, 3)],
        followers: &["parent-ana", "parent-ben", "parent-ana"],
    },
    SeedCohort {
        facility: "fac-sunflower",
        name: "Sunflower Daycare",
        age_group: "age_0",
        capacity: 9,
        enrolled: 9,
        waiting: 14,
        turnover: &[(150, 1)],
        followers: &["parent-cho"],
    },
    SeedCohort {
        facility: "fac-maple",
        name: "Maple Kids",
        age_group: "age_3",
        capacity: 40,
        enrolled: 28,
        waiting: 6,
        turnover: &[(15, 2), (60, 3), (120, 2), (240, 4), (330, 1)],
        followers: &["parent-dev"],
    },
];

/// Cohort whose enrollment the demo shifts between its two batches.
pub(crate) fn demo_shifted_cohort() -> CohortKey {
    CohortKey::new("fac-sunflower", "age_2")
}

/// Fill the in-memory stores with a small facility population.
pub(crate) fn seed_demo_population(stack: &InMemoryStack, as_of: DateTime<Utc>) {
    for seed in DEMO_POPULATION {
        let key = CohortKey::new(seed.facility, seed.age_group);
        stack.cohorts.upsert_capacity(AgeCohortCapacity {
            facility_id: key.facility_id.clone(),
            age_group: key.age_group.clone(),
            capacity: seed.capacity,
            current_enrollment: seed.enrolled,
            waiting_count: seed.waiting,
        });
        for (days_ago, seats_freed) in seed.turnover {
            stack.cohorts.record_turnover(TurnoverEvent {
                facility_id: key.facility_id.clone(),
                age_group: AgeGroup(seed.age_group.to_string()),
                occurred_at: as_of - Duration::days(*days_ago),
                seats_freed: *seats_freed,
            });
        }
        stack.audience.name_facility(&key.facility_id, seed.name);
        for follower in seed.followers {
            stack.audience.follow(&key, follower);
        }
    }
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("failed to parse '{raw}' as YYYY-MM-DD or RFC 3339"))
}
