//! Pattern Engine
//!
//! Maintains the set of candidate and established patterns.
//!
//! Processing an event has two phases:
//!
//! 1. **Update**: every pattern the event matches records an observation.
//!    Updates touch individual map entries and run concurrently.
//! 2. **Detect and prune**: when no existing pattern of a kind matches
//!    strongly, a candidate of that kind is proposed, then the pruning rules
//!    and the pattern cap are applied. This phase is serialized so two
//!    producers cannot propose the same candidate twice.
//!
//! A pattern is evicted when it has enough observations but low confidence
//! at a cycle boundary (or after surviving one), or when it never gathered
//! enough observations before the end of the cycle after its creation.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pattern::{Pattern, PatternKind};
use crate::config::PatternConfig;
use crate::event::Event;

// ============================================================================
// REPORTS
// ============================================================================

/// Effect of processing one or more events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    /// Pattern observations recorded (one event can match several patterns)
    pub observations: usize,
    /// Ids of candidates created
    pub created: Vec<String>,
    /// Patterns evicted by pruning or the cap
    pub evicted: usize,
}

impl ProcessReport {
    fn merge(&mut self, other: ProcessReport) {
        self.observations += other.observations;
        self.created.extend(other.created);
        self.evicted += other.evicted;
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Concurrent pattern set with detection and pruning
#[derive(Debug)]
pub struct PatternEngine {
    config: PatternConfig,
    patterns: DashMap<String, Pattern>,
    /// Serializes candidate detection and pruning
    detect: Mutex<()>,
    /// Patterns touched since the last completed cycle
    updated: Mutex<HashSet<String>>,
}

impl PatternEngine {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            patterns: DashMap::new(),
            detect: Mutex::new(()),
            updated: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Process events in order
    pub fn process_batch(&self, events: &[Event]) -> ProcessReport {
        let mut report = ProcessReport::default();
        for event in events {
            report.merge(self.process(event));
        }
        report
    }

    /// Update matching patterns, propose candidates, prune
    pub fn process(&self, event: &Event) -> ProcessReport {
        let mut report = ProcessReport::default();
        let mut touched = Vec::new();
        let mut strong_time = false;
        let mut strong_trigger = false;

        // Phase 1: per-entry updates
        for mut entry in self.patterns.iter_mut() {
            if let Some(strength) = entry.observe(event, &self.config) {
                report.observations += 1;
                touched.push(entry.id().to_string());
                if strength >= self.config.strong_match_threshold {
                    match entry.kind() {
                        PatternKind::TimeBased { .. } => strong_time = true,
                        PatternKind::TriggerBased { .. } => strong_trigger = true,
                    }
                }
            }
        }

        // Phase 2: detection and pruning
        let _guard = self.detect.lock().unwrap_or_else(|e| e.into_inner());

        let mut candidates = Vec::with_capacity(2);
        if !strong_time {
            candidates.push(Pattern::time_candidate(event, self.config.time_window_hours));
        }
        if !strong_trigger {
            candidates.extend(Pattern::trigger_candidate(event));
        }

        for mut candidate in candidates {
            if self.has_shape(candidate.kind()) {
                continue;
            }
            candidate.observe(event, &self.config);
            let id = candidate.id().to_string();
            debug!(
                pattern_id = %id,
                kind = candidate.kind().name(),
                label = %candidate.label(),
                "Proposed candidate pattern"
            );
            self.patterns.insert(id.clone(), candidate);
            touched.push(id.clone());
            report.created.push(id);
        }

        report.evicted = self.prune_locked(false);
        self.mark_updated(touched);
        report
    }

    fn has_shape(&self, kind: &PatternKind) -> bool {
        self.patterns.iter().any(|p| p.kind().same_shape(kind))
    }

    fn mark_updated(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let mut updated = self.updated.lock().unwrap_or_else(|e| e.into_inner());
        updated.extend(ids);
    }

    // ========================================================================
    // PRUNING
    // ========================================================================

    /// Whether `pattern` is due for eviction
    fn should_evict(&self, pattern: &Pattern, at_cycle_boundary: bool) -> bool {
        let established = pattern.cycles_survived() >= 1;
        if pattern.observation_count() >= self.config.minimum_observations {
            pattern.confidence() < self.config.minimum_confidence
                && (established || at_cycle_boundary)
        } else {
            // Too few observations after a full cycle
            established
        }
    }

    /// Apply the pruning rules and the pattern cap as of a cycle boundary
    pub fn prune_at_cycle_boundary(&self) -> usize {
        let _guard = self.detect.lock().unwrap_or_else(|e| e.into_inner());
        let evicted = self.prune_locked(true);
        if evicted > 0 {
            info!(evicted, remaining = self.patterns.len(), "Pruned patterns");
        }
        evicted
    }

    /// Caller must hold `detect`
    fn prune_locked(&self, at_cycle_boundary: bool) -> usize {
        let before = self.patterns.len();
        self.patterns
            .retain(|_, p| !self.should_evict(p, at_cycle_boundary));
        let mut evicted = before.saturating_sub(self.patterns.len());

        let overflow = self.patterns.len().saturating_sub(self.config.maximum_patterns);
        if overflow > 0 {
            // Lowest confidence first, oldest last observation on ties
            let mut ranked: Vec<(String, f64, Option<DateTime<Utc>>)> = self
                .patterns
                .iter()
                .map(|p| (p.id().to_string(), p.confidence(), p.last_observed()))
                .collect();
            ranked.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.2.cmp(&b.2))
            });
            for (id, _, _) in ranked.into_iter().take(overflow) {
                if self.patterns.remove(&id).is_some() {
                    evicted += 1;
                }
            }
        }

        evicted
    }

    // ========================================================================
    // CYCLE BOOKKEEPING
    // ========================================================================

    /// Ids of live patterns updated since the last completed cycle
    pub fn updated_since_cycle(&self) -> HashSet<String> {
        let updated = self.updated.lock().unwrap_or_else(|e| e.into_inner());
        updated
            .iter()
            .filter(|id| self.patterns.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Commit a completed cycle
    ///
    /// Only `analyzed` patterns (those in the set the cycle worked on) have
    /// survived it; patterns created while the cycle ran have not. `reported`
    /// ids are no longer pending.
    pub fn complete_cycle(&self, analyzed: &HashSet<String>, reported: &HashSet<String>) {
        for id in analyzed {
            if let Some(mut pattern) = self.patterns.get_mut(id) {
                pattern.mark_cycle_survived();
            }
        }
        let mut updated = self.updated.lock().unwrap_or_else(|e| e.into_inner());
        updated.retain(|id| !reported.contains(id) && self.patterns.contains_key(id));
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Copy of all patterns, highest confidence first
    pub fn snapshot(&self) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.patterns.iter().map(|p| p.value().clone()).collect();
        patterns.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id().cmp(b.id()))
        });
        patterns
    }

    pub fn get(&self, id: &str) -> Option<Pattern> {
        self.patterns.get(id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Replace the pattern set
    pub fn restore(&self, patterns: Vec<Pattern>) {
        let _guard = self.detect.lock().unwrap_or_else(|e| e.into_inner());
        self.patterns.clear();
        for pattern in patterns {
            self.patterns.insert(pattern.id().to_string(), pattern);
        }
        self.updated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

// ============================================================================
// TESTS
// ============================================================================
