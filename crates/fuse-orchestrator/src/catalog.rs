//! In-memory capability matcher with weighted ranking.
//!
//! Ranking: entries offered by a preferred agent come first, then entries
//! are ordered by a weighted score over reliability, success rate, latency
//! and recency of use. Ties keep registration order.
//!
//! Latency, success rate and recency are fed back through
//! [`CapabilityCatalog::record_outcome`]; a requirement may reweigh the
//! signals with its [`RankingPreferences`].

use crate::collaborators::CapabilityMatcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fuse_core::{
    CapabilityMatch, CapabilityRequirement, FuseResult, RankingPreferences, ValidationResult,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Latency at or above which the latency score bottoms out.
const MAX_ACCEPTABLE_LATENCY_MS: f64 = 5_000.0;
/// Age of last use at which the recency score bottoms out.
const MAX_RECENCY_SECS: f64 = 24.0 * 60.0 * 60.0;
/// Weight of the newest outcome in the success-rate moving average.
const SUCCESS_RATE_SMOOTHING: f64 = 0.1;

/// Observed runtime behaviour of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub average_latency_ms: f64,
    pub success_rate: f64,
    pub last_used: DateTime<Utc>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            average_latency_ms: 0.0,
            success_rate: 1.0,
            last_used: Utc::now(),
        }
    }
}

/// One capability offered by one or more agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub reliability: f64,
    #[serde(default)]
    pub metrics: PerformanceMetrics,
    /// Agents that provide this capability.
    #[serde(default)]
    pub agents: Vec<String>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, reliability: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reliability,
            metrics: PerformanceMetrics::default(),
            agents: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn offered_by(mut self, agent_id: impl Into<String>) -> Self {
        self.agents.push(agent_id.into());
        self
    }
}

/// Relative weight of each ranking signal. Normalized before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub reliability: f64,
    pub success_rate: f64,
    pub latency: f64,
    pub recent_activity: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            reliability: 0.4,
            success_rate: 0.3,
            latency: 0.2,
            recent_activity: 0.1,
        }
    }
}

impl RankingWeights {
    /// Weights scaled to sum to one. All-zero weights fall back to the defaults.
    pub fn normalized(self) -> Self {
        let sum = self.reliability + self.success_rate + self.latency + self.recent_activity;
        if sum <= 0.0 {
            return Self::default();
        }
        Self {
            reliability: self.reliability / sum,
            success_rate: self.success_rate / sum,
            latency: self.latency / sum,
            recent_activity: self.recent_activity / sum,
        }
    }

    /// Apply a requirement's preferences, then normalize.
    pub fn adjusted(self, preferences: &RankingPreferences) -> Self {
        let mut w = self;
        if let Some(custom) = preferences.custom_weights {
            w.reliability = custom.reliability.unwrap_or(w.reliability);
            w.success_rate = custom.success_rate.unwrap_or(w.success_rate);
            w.latency = custom.latency.unwrap_or(w.latency);
            w.recent_activity = custom.recent_activity.unwrap_or(w.recent_activity);
        }
        if preferences.prioritize_speed {
            w.latency = 0.5;
            w.reliability *= 0.7;
            w.success_rate *= 0.7;
        }
        if preferences.prioritize_accuracy {
            w.reliability = 0.5;
            w.success_rate = 0.4;
            w.latency *= 0.5;
        }
        if preferences.prioritize_recently_used {
            w.recent_activity = 0.4;
            w.reliability *= 0.8;
        }
        w.normalized()
    }

    /// Weighted score of an entry at time `now`.
    pub fn score(&self, entry: &CatalogEntry, now: DateTime<Utc>) -> f64 {
        let latency_score =
            (1.0 - entry.metrics.average_latency_ms / MAX_ACCEPTABLE_LATENCY_MS).max(0.0);
        let age_secs = (now - entry.metrics.last_used).num_milliseconds() as f64 / 1000.0;
        let recency_score = (1.0 - age_secs.max(0.0) / MAX_RECENCY_SECS).max(0.0);

        self.reliability * entry.reliability
            + self.success_rate * entry.metrics.success_rate
            + self.latency * latency_score
            + self.recent_activity * recency_score
    }
}

/// Capability catalog backing the [`CapabilityMatcher`] contract.
pub struct CapabilityCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
    weights: RankingWeights,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::with_weights(RankingWeights::default())
    }

    pub fn with_weights(weights: RankingWeights) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            weights: weights.normalized(),
        }
    }

    /// Add an entry, replacing any previous entry with the same id.
    pub fn register(&self, entry: CatalogEntry) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Fold one observed outcome into a capability's metrics.
    ///
    /// Latency is averaged with the previous value, success feeds an
    /// exponential moving average, and the entry counts as just used.
    /// Returns false for unknown capability ids.
    pub fn record_outcome(
        &self,
        capability_id: &str,
        latency_ms: Option<f64>,
        success: Option<bool>,
    ) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.id == capability_id) else {
            debug!(capability_id = %capability_id, "Outcome for unknown capability ignored");
            return false;
        };
        let metrics = &mut entry.metrics;
        if let Some(latency) = latency_ms {
            metrics.average_latency_ms = (metrics.average_latency_ms + latency) / 2.0;
        }
        if let Some(ok) = success {
            let observed = if ok { 1.0 } else { 0.0 };
            metrics.success_rate = metrics.success_rate * (1.0 - SUCCESS_RATE_SMOOTHING)
                + observed * SUCCESS_RATE_SMOOTHING;
        }
        metrics.last_used = Utc::now();
        debug!(
            capability_id = %capability_id,
            average_latency_ms = metrics.average_latency_ms,
            success_rate = metrics.success_rate,
            "Capability metrics updated"
        );
        true
    }

    pub fn entry(&self, capability_id: &str) -> Option<CatalogEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.id == capability_id)
            .cloned()
    }

    /// Eligible entries for a requirement, ranked.
    pub fn rank(&self, requirement: &CapabilityRequirement) -> Vec<CatalogEntry> {
        let now = Utc::now();
        let weights = match &requirement.preferences {
            Some(preferences) => self.weights.adjusted(preferences),
            None => self.weights,
        };
        let mut eligible: Vec<(CatalogEntry, bool, f64)> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.name == requirement.capability)
            .filter(|e| e.reliability >= requirement.min_reliability)
            .map(|e| {
                let preferred = e
                    .agents
                    .iter()
                    .any(|a| requirement.preferred_agents.contains(a));
                (e.clone(), preferred, weights.score(e, now))
            })
            .collect();

        eligible.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
        });
        eligible.into_iter().map(|(e, _, _)| e).collect()
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityMatcher for CapabilityCatalog {
    async fn discover(
        &self,
        requirement: &CapabilityRequirement,
    ) -> FuseResult<Vec<CapabilityMatch>> {
        Ok(self
            .rank(requirement)
            .into_iter()
            .map(|e| CapabilityMatch::new(e.id, e.name, e.reliability))
            .collect())
    }

    /// A capability nobody offers is missing; one that is offered but never
    /// at the required reliability is unreliable.
    async fn validate_requirements(
        &self,
        requirements: &[CapabilityRequirement],
    ) -> FuseResult<ValidationResult> {
        let entries = self.entries.read();
        let mut missing = Vec::new();
        let mut unreliable = Vec::new();

        for requirement in requirements {
            let offered: Vec<&CatalogEntry> = entries
                .iter()
                .filter(|e| e.name == requirement.capability)
                .collect();
            if offered.is_empty() {
                if !missing.contains(&requirement.capability) {
                    missing.push(requirement.capability.clone());
                }
            } else if !offered
                .iter()
                .any(|e| e.reliability >= requirement.min_reliability)
                && !unreliable.contains(&requirement.capability)
            {
                unreliable.push(requirement.capability.clone());
            }
        }

        Ok(ValidationResult::from_findings(missing, unreliable))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn metrics(latency: f64, success: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            average_latency_ms: latency,
            success_rate: success,
            last_used: Utc::now(),
        }
    }

    fn ids(matches: &[CapabilityMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.capability_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_ranks_by_weighted_score() {
        let catalog = CapabilityCatalog::new();
        catalog.register(
            CatalogEntry::new("slow", "summarize", 0.9).with_metrics(metrics(4_500.0, 0.9)),
        );
        catalog.register(
            CatalogEntry::new("fast", "summarize", 0.9).with_metrics(metrics(200.0, 0.9)),
        );
        catalog.register(CatalogEntry::new("other", "translate", 1.0));

        let matches = catalog
            .discover(&CapabilityRequirement::new("summarize"))
            .await
            .unwrap();
        assert_eq!(ids(&matches), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_preferred_agent_outranks_score() {
        let catalog = CapabilityCatalog::new();
        catalog.register(CatalogEntry::new("best", "code", 1.0).offered_by("agent-a"));
        catalog.register(
            CatalogEntry::new("weaker", "code", 0.5)
                .with_metrics(metrics(3_000.0, 0.5))
                .offered_by("agent-b"),
        );

        let requirement =
            CapabilityRequirement::new("code").with_preferred_agents(vec!["agent-b".into()]);
        let matches = catalog.discover(&requirement).await.unwrap();
        assert_eq!(ids(&matches), vec!["weaker", "best"]);
    }

    #[tokio::test]
    async fn test_min_reliability_filters() {
        let catalog = CapabilityCatalog::new();
        catalog.register(CatalogEntry::new("c1", "code", 0.6));
        catalog.register(CatalogEntry::new("c2", "code", 0.95));
        let matches = catalog
            .discover(&CapabilityRequirement::new("code").with_min_reliability(0.9))
            .await
            .unwrap();
        assert_eq!(ids(&matches), vec!["c2"]);
    }

    #[tokio::test]
    async fn test_validate_requirements_splits_missing_and_unreliable() {
        let catalog = CapabilityCatalog::new();
        catalog.register(CatalogEntry::new("c1", "code", 0.6));
        catalog.register(CatalogEntry::new("w1", "writing", 0.99));

        let verdict = catalog
            .validate_requirements(&[
                CapabilityRequirement::new("code").with_min_reliability(0.9),
                CapabilityRequirement::new("vision"),
                CapabilityRequirement::new("writing").with_min_reliability(0.9),
                CapabilityRequirement::new("vision"),
            ])
            .await
            .unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.missing_capabilities, vec!["vision".to_string()]);
        assert_eq!(verdict.unreliable_capabilities, vec!["code".to_string()]);
    }

    #[test]
    fn test_weights_normalize() {
        let w = RankingWeights {
            reliability: 2.0,
            success_rate: 1.0,
            latency: 1.0,
            recent_activity: 0.0,
        }
        .normalized();
        assert!((w.reliability - 0.5).abs() < 1e-9);
        assert!((w.latency - 0.25).abs() < 1e-9);

        let zero = RankingWeights {
            reliability: 0.0,
            success_rate: 0.0,
            latency: 0.0,
            recent_activity: 0.0,
        };
        assert_eq!(zero.normalized(), RankingWeights::default());
    }

    #[test]
    fn test_stale_entry_scores_lower() {
        let weights = RankingWeights::default();
        let now = Utc::now();
        let fresh = CatalogEntry::new("f", "x", 0.8).with_metrics(metrics(0.0, 1.0));
        let stale = CatalogEntry::new("s", "x", 0.8).with_metrics(PerformanceMetrics {
            last_used: now - chrono::Duration::days(2),
            ..metrics(0.0, 1.0)
        });
        assert!(weights.score(&fresh, now) > weights.score(&stale, now));
    }

    #[tokio::test]
    async fn test_failures_demote_capability() {
        let catalog = CapabilityCatalog::new();
        catalog.register(
            CatalogEntry::new("flaky", "summarize", 0.9).with_metrics(metrics(200.0, 1.0)),
        );
        catalog.register(
            CatalogEntry::new("steady", "summarize", 0.9).with_metrics(metrics(200.0, 0.95)),
        );
        let requirement = CapabilityRequirement::new("summarize");
        assert_eq!(
            ids(&catalog.discover(&requirement).await.unwrap()),
            vec!["flaky", "steady"]
        );

        for _ in 0..5 {
            assert!(catalog.record_outcome("flaky", None, Some(false)));
        }
        let flaky = catalog.entry("flaky").unwrap();
        assert!((flaky.metrics.success_rate - 0.9_f64.powi(5)).abs() < 1e-9);
        assert_eq!(
            ids(&catalog.discover(&requirement).await.unwrap()),
            vec!["steady", "flaky"]
        );
    }

    #[test]
    fn test_record_outcome_averages_latency() {
        let catalog = CapabilityCatalog::new();
        let stale = PerformanceMetrics {
            last_used: Utc::now() - chrono::Duration::hours(3),
            ..metrics(1_000.0, 0.5)
        };
        catalog.register(CatalogEntry::new("c1", "code", 0.9).with_metrics(stale.clone()));

        assert!(catalog.record_outcome("c1", Some(3_000.0), None));
        let updated = catalog.entry("c1").unwrap().metrics;
        assert_eq!(updated.average_latency_ms, 2_000.0);
        assert_eq!(updated.success_rate, 0.5);
        assert!(updated.last_used > stale.last_used);

        assert!(catalog.record_outcome("c1", None, Some(true)));
        let updated = catalog.entry("c1").unwrap().metrics;
        assert!((updated.success_rate - 0.55).abs() < 1e-9);

        assert!(!catalog.record_outcome("ghost", Some(1.0), Some(true)));
    }

    #[tokio::test]
    async fn test_speed_preference_reorders() {
        let catalog = CapabilityCatalog::new();
        catalog.register(
            CatalogEntry::new("careful", "code", 1.0).with_metrics(metrics(4_000.0, 1.0)),
        );
        catalog.register(
            CatalogEntry::new("quick", "code", 0.7).with_metrics(metrics(100.0, 0.7)),
        );

        let plain = CapabilityRequirement::new("code");
        assert_eq!(
            ids(&catalog.discover(&plain).await.unwrap()),
            vec!["careful", "quick"]
        );

        let hurried = CapabilityRequirement::new("code").with_preferences(RankingPreferences {
            prioritize_speed: true,
            ..RankingPreferences::default()
        });
        assert_eq!(
            ids(&catalog.discover(&hurried).await.unwrap()),
            vec!["quick", "careful"]
        );
    }

    #[test]
    fn test_preferences_adjust_weights() {
        let accurate = RankingWeights::default().adjusted(&RankingPreferences {
            prioritize_accuracy: true,
            ..RankingPreferences::default()
        });
        // 0.5, 0.4, 0.1, 0.1 before normalizing
        assert!((accurate.reliability - 0.5 / 1.1).abs() < 1e-9);
        assert!((accurate.latency - 0.1 / 1.1).abs() < 1e-9);

        let custom = RankingWeights::default().adjusted(&RankingPreferences {
            custom_weights: Some(fuse_core::WeightOverrides {
                latency: Some(0.0),
                recent_activity: Some(0.0),
                ..Default::default()
            }),
            ..RankingPreferences::default()
        });
        assert_eq!(custom.latency, 0.0);
        assert!((custom.reliability - 0.4 / 0.7).abs() < 1e-9);

        let unchanged = RankingWeights::default().adjusted(&RankingPreferences::default());
        assert!((unchanged.reliability - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_register_replaces_same_id() {
        let catalog = CapabilityCatalog::new();
        catalog.register(CatalogEntry::new("c1", "code", 0.6));
        catalog.register(CatalogEntry::new("c1", "code", 0.9));
        assert_eq!(catalog.len(), 1);
    }
}
