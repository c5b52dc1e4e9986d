// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback resolution for resource requests that cannot be satisfied.
//!
//! A [`FallbackChain`] walks statically registered strategies in ascending
//! priority order and returns the first successful [`FallbackResult`]. The
//! terminal strategy always succeeds by asking for manual intervention, so a
//! well-formed context always resolves to something actionable.
//!
//! ```text
//! Pending -> Evaluating(0) -> Resolved
//!                 |
//!                 v
//!            Evaluating(1) -> ... -> ManualIntervention
//! ```
//!
//! Strategies only read the context they are given. Resources a strategy
//! examined and declined are added to `previous_attempts`, and no strategy
//! may offer a resource that is already in that set.

mod strategies;

pub use strategies::{
    AlternateSameCapability, CrossTrained, FallbackTuning, ManualIntervention, QueueWithPriority,
    SplitAcrossResources,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain_error::ErrorCode;
use crate::error::{Error, Result};

fn default_available() -> bool {
    true
}

/// How a resource relates to a required capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityMatch {
    Primary,
    CrossTrained,
    None,
}

/// A station (or other resource) and its current workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCandidate {
    pub id: String,
    pub capability: String,
    #[serde(default)]
    pub secondary_capabilities: Vec<String>,
    /// Percent of capacity in use, 0 to 100.
    pub utilization: f64,
    #[serde(default)]
    pub queue_depth: u32,
    /// False when the resource has failed or is out of service.
    #[serde(default = "default_available")]
    pub available: bool,
}

impl ResourceCandidate {
    pub fn new(id: impl Into<String>, capability: impl Into<String>, utilization: f64) -> Self {
        ResourceCandidate {
            id: id.into(),
            capability: capability.into(),
            secondary_capabilities: Vec::new(),
            utilization,
            queue_depth: 0,
            available: true,
        }
    }

    pub fn with_secondary(mut self, capability: impl Into<String>) -> Self {
        self.secondary_capabilities.push(capability.into());
        self
    }

    pub fn with_queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn capability_match(&self, capability: &str) -> CapabilityMatch {
        if self.capability == capability {
            CapabilityMatch::Primary
        } else if self.secondary_capabilities.iter().any(|c| c == capability) {
            CapabilityMatch::CrossTrained
        } else {
            CapabilityMatch::None
        }
    }

    /// Available and below the saturation threshold.
    pub fn has_spare_capacity(&self, threshold: f64) -> bool {
        self.available && self.utilization < threshold
    }
}

/// An independent piece of a request that can be prepared on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: String,
    pub capability: String,
}

/// What asked for the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackOrigin {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Input to one resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackContext {
    pub target: ResourceCandidate,
    pub required_capability: String,
    #[serde(default)]
    pub candidates: Vec<ResourceCandidate>,
    #[serde(default)]
    pub previous_attempts: BTreeSet<String>,
    #[serde(default)]
    pub previous_strategies: BTreeSet<String>,
    #[serde(default)]
    pub origin: FallbackOrigin,
    #[serde(default)]
    pub units: Vec<WorkUnit>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorCode>,
}

impl FallbackContext {
    /// Context requiring the target's own capability.
    pub fn new(
        target: ResourceCandidate,
        candidates: Vec<ResourceCandidate>,
        origin: FallbackOrigin,
    ) -> Self {
        FallbackContext {
            required_capability: target.capability.clone(),
            target,
            candidates,
            previous_attempts: BTreeSet::new(),
            previous_strategies: BTreeSet::new(),
            origin,
            units: Vec::new(),
            priority: 0,
            failure: None,
        }
    }

    pub fn with_units(mut self, units: Vec<WorkUnit>) -> Self {
        self.units = units;
        self
    }

    pub fn with_previous_attempt(mut self, resource_id: impl Into<String>) -> Self {
        self.previous_attempts.insert(resource_id.into());
        self
    }

    pub fn with_failure(mut self, code: ErrorCode) -> Self {
        self.failure = Some(code);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.id.is_empty() {
            return Err(Error::InvalidFallbackContext("target resource id is empty".to_string()));
        }
        if self.required_capability.is_empty() {
            return Err(Error::InvalidFallbackContext("required capability is empty".to_string()));
        }
        let all = std::iter::once(&self.target).chain(self.candidates.iter());
        for candidate in all {
            if !(0.0..=100.0).contains(&candidate.utilization) {
                return Err(Error::InvalidFallbackContext(format!(
                    "utilization of {} is {}, expected 0-100",
                    candidate.id, candidate.utilization
                )));
            }
        }
        Ok(())
    }

    /// The target itself and anything already tried are off limits for
    /// alternative assignment.
    pub fn is_excluded(&self, resource_id: &str) -> bool {
        resource_id == self.target.id || self.previous_attempts.contains(resource_id)
    }

    /// Candidates that have not been tried yet, in the given order.
    pub fn fresh_candidates(&self) -> impl Iterator<Item = &ResourceCandidate> {
        self.candidates.iter().filter(|c| !self.is_excluded(&c.id))
    }
}

/// One unit placed on one resource by a split resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub unit_id: String,
    pub resource_id: String,
}

/// Output of a resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResult {
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub split: Vec<SplitAssignment>,
    pub justification: String,
    pub requires_manual_intervention: bool,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delay_mins: Option<u32>,
}

impl FallbackResult {
    /// Every resource id this result asks the caller to use.
    pub fn offered_resources(&self) -> Vec<&str> {
        let split = self.split.iter().map(|s| s.resource_id.as_str());
        self.resolved_id.iter().map(String::as_str).chain(split).collect()
    }
}

/// What a single strategy concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Resolved(FallbackResult),
    /// Nothing suitable. `examined` lists resources considered and rejected.
    Declined { examined: Vec<String>, reason: String },
}

/// One way of recovering from a failed resource request.
pub trait FallbackStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> u8;

    fn condition(&self, ctx: &FallbackContext) -> bool;

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome;
}

/// State of a resolution pass, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionStep {
    Pending,
    Evaluating { strategy: &'static str },
    Skipped { strategy: &'static str, reason: String },
    Declined { strategy: &'static str, reason: String },
    Resolved { strategy: &'static str },
    ManualIntervention { strategy: &'static str },
}

/// Result plus the path the chain took to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub result: FallbackResult,
    pub trace: Vec<ResolutionStep>,
    /// `previous_attempts` as it stood at the end of the pass.
    pub attempted: BTreeSet<String>,
}

/// Priority-ordered list of strategies.
pub struct FallbackChain {
    strategies: Vec<Box<dyn FallbackStrategy>>,
    terminal: ManualIntervention,
}

impl FallbackChain {
    pub fn new(mut strategies: Vec<Box<dyn FallbackStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.priority());
        FallbackChain { strategies, terminal: ManualIntervention }
    }

    /// The built-in station-resource strategies.
    pub fn with_defaults(tuning: FallbackTuning) -> Self {
        FallbackChain::new(vec![
            Box::new(AlternateSameCapability::new(tuning)),
            Box::new(CrossTrained::new(tuning)),
            Box::new(SplitAcrossResources::new(tuning)),
            Box::new(QueueWithPriority::new(tuning)),
            Box::new(ManualIntervention),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, ctx: FallbackContext) -> FallbackResult {
        self.resolve_traced(ctx).result
    }

    pub fn resolve_traced(&self, mut ctx: FallbackContext) -> Resolution {
        let mut trace = vec![ResolutionStep::Pending];

        for strategy in &self.strategies {
            let name = strategy.name();
            if ctx.previous_strategies.contains(name) {
                let reason = "already tried".to_string();
                trace.push(ResolutionStep::Skipped { strategy: name, reason });
                continue;
            }
            if !strategy.condition(&ctx) {
                let reason = "not applicable".to_string();
                trace.push(ResolutionStep::Skipped { strategy: name, reason });
                continue;
            }

            trace.push(ResolutionStep::Evaluating { strategy: name });
            ctx.previous_strategies.insert(name.to_string());

            match strategy.execute(&ctx) {
                StrategyOutcome::Resolved(result) => {
                    let reused: Vec<String> = result
                        .offered_resources()
                        .into_iter()
                        .filter(|id| ctx.previous_attempts.contains(*id))
                        .map(String::from)
                        .collect();
                    if !reused.is_empty() {
                        tracing::debug!(
                            strategy = name,
                            ?reused,
                            "fallback strategy re-offered a tried resource"
                        );
                        trace.push(ResolutionStep::Declined {
                            strategy: name,
                            reason: format!("re-offered {}", reused.join(", ")),
                        });
                        continue;
                    }

                    let offered = result.offered_resources().into_iter().map(String::from);
                    ctx.previous_attempts.extend(offered);
                    trace.push(if result.requires_manual_intervention {
                        ResolutionStep::ManualIntervention { strategy: name }
                    } else {
                        ResolutionStep::Resolved { strategy: name }
                    });
                    tracing::debug!(
                        strategy = name,
                        resolved = ?result.resolved_id,
                        "fallback resolved"
                    );
                    return Resolution { result, trace, attempted: ctx.previous_attempts };
                }
                StrategyOutcome::Declined { examined, reason } => {
                    ctx.previous_attempts.extend(examined);
                    trace.push(ResolutionStep::Declined { strategy: name, reason });
                }
            }
        }

        // Every registered strategy declined or was skipped.
        let result = self.terminal.build(&ctx);
        trace.push(ResolutionStep::ManualIntervention { strategy: self.terminal.name() });
        Resolution { result, trace, attempted: ctx.previous_attempts }
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        FallbackChain::with_defaults(FallbackTuning::default())
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod chain_tests;
