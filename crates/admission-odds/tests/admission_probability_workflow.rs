use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use admission_odds::workflows::admission::{
    AgeCohortCapacity, AlertError, AlertPublisher, AudienceSource, CohortKey, CohortRepository,
    Confidence, FacilityId, FactorExtractor, Grade, KeyValueStore, ProbabilityAlert,
    ProbabilityChangeDetector, ProbabilityEngine, ProbabilityService, ProbabilitySnapshot,
    RecomputePolicy, RecomputeScheduler, RepositoryError, ScoringConfig, SnapshotStore,
    StoreError, StoredValue, TrendDirection, TurnoverEvent, UpsertOutcome,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn intake_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 30, 0)
        .single()
        .expect("valid timestamp")
}

struct Population {
    capacities: Mutex<Vec<AgeCohortCapacity>>,
    events: Vec<TurnoverEvent>,
}

impl Population {
    fn new() -> Self {
        Self {
            capacities: Mutex::new(Vec::new()),
            events: Vec::new(),
        }
    }

    fn cohort(mut self, key: &CohortKey, capacity: i64, enrolled: i64, waiting: i64) -> Self {
        self.capacities
            .get_mut()
            .expect("capacity mutex poisoned")
            .push(AgeCohortCapacity {
                facility_id: key.facility_id.clone(),
                age_group: key.age_group.clone(),
                capacity,
                current_enrollment: enrolled,
                waiting_count: waiting,
            });
        self
    }

    fn freed(mut self, key: &CohortKey, days_ago: i64, seats_freed: u32) -> Self {
        self.events.push(TurnoverEvent {
            facility_id: key.facility_id.clone(),
            age_group: key.age_group.clone(),
            occurred_at: intake_day() - Duration::days(days_ago),
            seats_freed,
        });
        self
    }

    fn set_enrollment(&self, key: &CohortKey, enrolled: i64) {
        let mut guard = self.capacities.lock().expect("capacity mutex poisoned");
        if let Some(capacity) = guard.iter_mut().find(|capacity| &capacity.key() == key) {
            capacity.current_enrollment = enrolled;
        }
    }
}

impl CohortRepository for Population {
    fn fetch_age_cohort_capacity(
        &self,
        key: &CohortKey,
    ) -> Result<Option<AgeCohortCapacity>, RepositoryError> {
        let guard = self.capacities.lock().expect("capacity mutex poisoned");
        Ok(guard.iter().find(|capacity| &capacity.key() == key).cloned())
    }

    fn fetch_turnover_events(
        &self,
        key: &CohortKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<TurnoverEvent>, RepositoryError> {
        Ok(self
            .events
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
        let guard = self.capacities.lock().expect("capacity mutex poisoned");
        Ok(guard.iter().map(AgeCohortCapacity::key).collect())
    }
}

#[derive(Default)]
struct Snapshots(Mutex<HashMap<CohortKey, ProbabilitySnapshot>>);

impl SnapshotStore for Snapshots {
    fn fetch_previous_snapshot(
        &self,
        key: &CohortKey,
    ) -> Result<Option<ProbabilitySnapshot>, RepositoryError> {
        Ok(self.0.lock().expect("snapshot mutex poisoned").get(key).cloned())
    }

    fn upsert_if_newer(
        &self,
        snapshot: ProbabilitySnapshot,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut guard = self.0.lock().expect("snapshot mutex poisoned");
        if let Some(current) = guard.get(&snapshot.key()) {
            if current.calculated_at > snapshot.calculated_at {
                return Ok(UpsertOutcome::Superseded {
                    current: current.clone(),
                });
            }
        }
        Ok(match guard.insert(snapshot.key(), snapshot) {
            Some(previous) => UpsertOutcome::Replaced { previous },
            None => UpsertOutcome::Inserted,
        })
    }
}

#[derive(Default)]
struct Cooldowns(Mutex<HashMap<String, StoredValue>>);

impl KeyValueStore for Cooldowns {
    fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.0.lock().expect("store mutex poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: String, ttl: Option<StdDuration>) -> Result<(), StoreError> {
        let expires_at = ttl
            .and_then(|ttl| Duration::from_std(ttl).ok())
            .map(|ttl| intake_day() + ttl);
        self.0
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }
}

struct Parents;

impl AudienceSource for Parents {
    fn facility_name(&self, facility_id: &FacilityId) -> Result<Option<String>, AlertError> {
        Ok(Some(format!("Daycare {facility_id}")))
    }

    fn interested_users(&self, _key: &CohortKey) -> Result<Vec<String>, AlertError> {
        Ok(vec!["parent-1".to_string(), "parent-2".to_string()])
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<ProbabilityAlert>>);

impl AlertPublisher for Inbox {
    fn publish(&self, alert: ProbabilityAlert) -> Result<(), AlertError> {
        self.0.lock().expect("inbox mutex poisoned").push(alert);
        Ok(())
    }
}

#[test]
fn pure_engine_matches_worked_example() {
    let engine = ProbabilityEngine::new(ScoringConfig::default());
    let factors = admission_odds::workflows::admission::Factors {
        queue_position: 5,
        total_waiting: 20,
        class_capacity: 30,
        current_enroll: 25,
        historical_to_rate: 1.0,
        priority: 1,
        bonus_points: 2.0,
    };

    let result = engine.calculate(&factors, 3);

    assert_eq!(result.probability, 66.6);
    assert_eq!(result.grade, Grade::C);
    assert_eq!(result.grade.label(), "Moderate");
}

#[test]
fn batch_recompute_persists_snapshots_and_alerts_on_large_moves() {
    let busy = CohortKey::new("fac-maple", "age_3");
    let quiet = CohortKey::new("fac-birch", "age_1");
    let population = Arc::new(
        Population::new()
            .cohort(&busy, 30, 25, 20)
            .cohort(&quiet, 10, 10, 0)
            .freed(&busy, 20, 3)
            .freed(&busy, 90, 4)
            .freed(&busy, 200, 2)
            .freed(&busy, 300, 3),
    );
    let snapshots = Arc::new(Snapshots::default());
    let inbox = Arc::new(Inbox::default());
    let engine = ProbabilityEngine::new(ScoringConfig::default());
    let service = Arc::new(ProbabilityService::new(
        FactorExtractor::new(population.clone()),
        snapshots.clone(),
        engine,
    ));
    let detector = Arc::new(ProbabilityChangeDetector::new(
        Arc::new(Cooldowns::default()),
        Arc::new(Parents),
        inbox.clone(),
    ));
    let scheduler = RecomputeScheduler::new(
        service.clone(),
        population.clone(),
        detector,
        RecomputePolicy::default(),
    );

    let first = scheduler.run_batch(intake_day()).expect("first batch runs");
    assert_eq!(first.considered, 2);
    assert_eq!(first.recomputed.len(), 2);
    assert!(first.failures.is_empty());
    assert_eq!(first.alerts_sent, 0);

    let stored = snapshots
        .fetch_previous_snapshot(&busy)
        .expect("store readable")
        .expect("busy cohort stored");
    assert_eq!(stored.probability, 50.8);
    assert_eq!(stored.grade, Grade::D);

    // Ten children leave before the next run, opening seats.
    population.set_enrollment(&busy, 15);
    let later = intake_day() + Duration::days(8);
    let second = scheduler.run_batch(later).expect("second batch runs");

    let busy_result = second
        .recomputed
        .iter()
        .find(|cohort| cohort.key == busy)
        .expect("busy cohort recomputed");
    let trend = busy_result.trend.as_ref().expect("trend against first run");
    assert_eq!(trend.direction, TrendDirection::Up);
    assert_eq!(second.alerts_sent, 2);

    let alerts = inbox.0.lock().expect("inbox mutex poisoned").clone();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|alert| alert.action_url == "/facility/fac-maple"));
    assert!(alerts[0].body.contains("(rising)"));
}

#[test]
fn lookup_flags_sparse_turnover_history() {
    let key = CohortKey::new("fac-new", "age_0");
    let population = Arc::new(Population::new().cohort(&key, 12, 6, 3).freed(&key, 10, 1));
    let service = ProbabilityService::new(
        FactorExtractor::new(population),
        Arc::new(Snapshots::default()),
        ProbabilityEngine::new(ScoringConfig::default()),
    );

    let result = service
        .calculate(&key, None, intake_day())
        .expect("cohort scores");

    assert_eq!(result.confidence, Confidence::Low);
    assert_eq!(result.turnover_samples, 1);
    assert!(result.trend.is_none());
}
