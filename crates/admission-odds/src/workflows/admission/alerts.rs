use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::{KeyValueStore, StoreError};
use super::domain::{CohortKey, FacilityId};

pub const DEFAULT_CHANGE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

/// Looks up who cares about a cohort: users who saved the facility or are waiting on it.
pub trait AudienceSource: Send + Sync {
    fn facility_name(&self, facility_id: &FacilityId) -> Result<Option<String>, AlertError>;

    /// Interested user ids. Duplicates are allowed and removed by the caller.
    fn interested_users(&self, key: &CohortKey) -> Result<Vec<String>, AlertError>;
}

/// Outbound delivery of alerts (in-app inbox, push, etc.).
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, alert: ProbabilityAlert) -> Result<(), AlertError>;
}

/// Hook the recompute scheduler calls after a snapshot overwrite.
pub trait ChangeNotifier: Send + Sync {
    fn probability_changed(
        &self,
        key: &CohortKey,
        previous: f64,
        current: f64,
        as_of: DateTime<Utc>,
    ) -> Result<AlertSummary, AlertError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Rising,
    Falling,
}

impl ChangeDirection {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeDirection::Rising => "rising",
            ChangeDirection::Falling => "falling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityAlert {
    pub user_id: String,
    pub facility_id: FacilityId,
    pub title: String,
    pub body: String,
    pub action_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub alerts_created: usize,
    /// Users whose alert could not be delivered or whose cooldown could not be read.
    pub failed_deliveries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<ChangeDirection>,
    pub diff: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
    #[error("audience lookup failed: {0}")]
    Audience(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Alerts interested users when a cohort's probability moves by at least `threshold`
/// points, at most once per user and cohort within `cooldown`.
pub struct ProbabilityChangeDetector<K, A, P> {
    store: Arc<K>,
    audience: Arc<A>,
    publisher: Arc<P>,
    threshold: f64,
    cooldown: Duration,
}

impl<K, A, P> ProbabilityChangeDetector<K, A, P>
where
    K: KeyValueStore,
    A: AudienceSource,
    P: AlertPublisher,
{
    pub fn new(store: Arc<K>, audience: Arc<A>, publisher: Arc<P>) -> Self {
        Self {
            store,
            audience,
            publisher,
            threshold: DEFAULT_CHANGE_THRESHOLD,
            cooldown: Duration::minutes(DEFAULT_COOLDOWN_MINUTES),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn detect(
        &self,
        key: &CohortKey,
        previous: f64,
        current: f64,
        as_of: DateTime<Utc>,
    ) -> Result<AlertSummary, AlertError> {
        let diff = current - previous;
        if diff.abs() < self.threshold {
            return Ok(AlertSummary {
                diff,
                ..AlertSummary::default()
            });
        }

        let Some(facility_name) = self.audience.facility_name(&key.facility_id)? else {
            return Ok(AlertSummary {
                diff,
                ..AlertSummary::default()
            });
        };

        let mut seen = HashSet::new();
        let users: Vec<String> = self
            .audience
            .interested_users(key)?
            .into_iter()
            .filter(|user| seen.insert(user.clone()))
            .collect();

        let direction = if diff > 0.0 {
            ChangeDirection::Rising
        } else {
            ChangeDirection::Falling
        };
        let body = format!(
            "{} {} probability moved from {}% to {}% ({})",
            facility_name,
            key.age_group,
            previous.round(),
            current.round(),
            direction.label()
        );

        let mut alerts_created = 0;
        let mut failed_deliveries = 0;
        for user_id in users {
            let cooldown_key = cooldown_key(&user_id, key);
            match self.cooling_down(&cooldown_key, as_of) {
                Ok(true) => {
                    debug!(%user_id, cohort = %key, "probability alert suppressed by cooldown");
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%user_id, cohort = %key, error = %err, "cooldown lookup failed");
                    failed_deliveries += 1;
                    continue;
                }
            }

            let alert = ProbabilityAlert {
                user_id: user_id.clone(),
                facility_id: key.facility_id.clone(),
                title: "Probability change".to_string(),
                body: body.clone(),
                action_url: format!("/facility/{}", key.facility_id),
            };
            if let Err(err) = self.publisher.publish(alert) {
                warn!(%user_id, cohort = %key, error = %err, "probability alert not delivered");
                failed_deliveries += 1;
                continue;
            }
            alerts_created += 1;

            // Suppression compares against this timestamp, never a store-side expiry.
            if let Err(err) = self.store.set(&cooldown_key, as_of.to_rfc3339(), None) {
                warn!(%user_id, cohort = %key, error = %err, "cooldown not recorded");
            }
        }

        Ok(AlertSummary {
            alerts_created,
            failed_deliveries,
            direction: Some(direction),
            diff,
        })
    }

    fn cooling_down(&self, cooldown_key: &str, as_of: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(last_sent) = self.store.get(cooldown_key)? else {
            return Ok(false);
        };
        let Ok(last_sent) = DateTime::parse_from_rfc3339(&last_sent) else {
            return Ok(false);
        };
        Ok(as_of - last_sent.with_timezone(&Utc) <= self.cooldown)
    }
}

impl<K, A, P> ChangeNotifier for ProbabilityChangeDetector<K, A, P>
where
    K: KeyValueStore,
    A: AudienceSource,
    P: AlertPublisher,
{
    fn probability_changed(
        &self,
        key: &CohortKey,
        previous: f64,
        current: f64,
        as_of: DateTime<Utc>,
    ) -> Result<AlertSummary, AlertError> {
        self.detect(key, previous, current, as_of)
    }
}

fn cooldown_key(user_id: &str, key: &CohortKey) -> String {
    format!("probability-alert:{user_id}:{}:{}", key.facility_id, key.age_group)
}
