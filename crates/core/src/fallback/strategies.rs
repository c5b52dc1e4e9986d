// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in strategies for station resource failures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{
    CapabilityMatch, FallbackContext, FallbackResult, FallbackStrategy, ResourceCandidate,
    SplitAssignment, StrategyOutcome,
};
use crate::domain_error::ErrorCode;

/// Thresholds and delay estimates shared by the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTuning {
    /// Utilization percent at or above which a resource counts as saturated.
    pub saturation_threshold: f64,
    pub minutes_per_queued_ticket: u32,
    /// Extra minutes when a cross-trained resource does the work.
    pub cross_training_penalty_mins: u32,
    /// Deepest queue the target may have and still accept a priority slot.
    pub max_queue_depth: u32,
}

impl Default for FallbackTuning {
    fn default() -> Self {
        FallbackTuning {
            saturation_threshold: 85.0,
            minutes_per_queued_ticket: 4,
            cross_training_penalty_mins: 5,
            max_queue_depth: 12,
        }
    }
}

impl FallbackTuning {
    fn queue_delay(&self, candidate: &ResourceCandidate) -> u32 {
        candidate.queue_depth.saturating_mul(self.minutes_per_queued_ticket)
    }
}

/// Least utilized first, then shortest queue, then id for a stable pick.
fn least_loaded<'a>(
    candidates: impl Iterator<Item = &'a ResourceCandidate>,
) -> Option<&'a ResourceCandidate> {
    candidates.min_by(|a, b| {
        a.utilization
            .total_cmp(&b.utilization)
            .then(a.queue_depth.cmp(&b.queue_depth))
            .then(a.id.cmp(&b.id))
    })
}

fn order_label(ctx: &FallbackContext) -> String {
    match ctx.origin.order_id.as_deref() {
        Some(id) => format!("order {id}"),
        None => "the request".to_string(),
    }
}

/// Route to another resource with the same primary capability.
#[derive(Debug, Clone, Default)]
pub struct AlternateSameCapability {
    tuning: FallbackTuning,
}

impl AlternateSameCapability {
    pub const NAME: &'static str = "alternate_same_capability";

    pub fn new(tuning: FallbackTuning) -> Self {
        AlternateSameCapability { tuning }
    }
}

impl FallbackStrategy for AlternateSameCapability {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        10
    }

    fn condition(&self, ctx: &FallbackContext) -> bool {
        ctx.fresh_candidates()
            .any(|c| c.capability_match(&ctx.required_capability) == CapabilityMatch::Primary)
    }

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome {
        let same: Vec<&ResourceCandidate> = ctx
            .fresh_candidates()
            .filter(|c| c.capability_match(&ctx.required_capability) == CapabilityMatch::Primary)
            .collect();
        let threshold = self.tuning.saturation_threshold;

        match least_loaded(same.iter().copied().filter(|c| c.has_spare_capacity(threshold))) {
            Some(pick) => StrategyOutcome::Resolved(FallbackResult {
                strategy: Self::NAME.to_string(),
                resolved_id: Some(pick.id.clone()),
                split: Vec::new(),
                justification: format!(
                    "{} also handles {} and is at {:.0}% utilization",
                    pick.id, ctx.required_capability, pick.utilization
                ),
                requires_manual_intervention: false,
                suggested_actions: vec![format!("Send {} to {}", order_label(ctx), pick.id)],
                estimated_delay_mins: Some(self.tuning.queue_delay(pick)),
            }),
            None => StrategyOutcome::Declined {
                examined: same.iter().map(|c| c.id.clone()).collect(),
                reason: format!(
                    "every {} resource is saturated or out of service",
                    ctx.required_capability
                ),
            },
        }
    }
}

/// Route to a resource that lists the capability as secondary.
#[derive(Debug, Clone, Default)]
pub struct CrossTrained {
    tuning: FallbackTuning,
}

impl CrossTrained {
    pub const NAME: &'static str = "cross_trained";

    pub fn new(tuning: FallbackTuning) -> Self {
        CrossTrained { tuning }
    }
}

impl FallbackStrategy for CrossTrained {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        20
    }

    fn condition(&self, ctx: &FallbackContext) -> bool {
        ctx.fresh_candidates()
            .any(|c| c.capability_match(&ctx.required_capability) == CapabilityMatch::CrossTrained)
    }

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome {
        let trained: Vec<&ResourceCandidate> = ctx
            .fresh_candidates()
            .filter(|c| {
                c.capability_match(&ctx.required_capability) == CapabilityMatch::CrossTrained
            })
            .collect();
        let threshold = self.tuning.saturation_threshold;

        match least_loaded(trained.iter().copied().filter(|c| c.has_spare_capacity(threshold))) {
            Some(pick) => StrategyOutcome::Resolved(FallbackResult {
                strategy: Self::NAME.to_string(),
                resolved_id: Some(pick.id.clone()),
                split: Vec::new(),
                justification: format!(
                    "{} is cross-trained for {} and is at {:.0}% utilization",
                    pick.id, ctx.required_capability, pick.utilization
                ),
                requires_manual_intervention: false,
                suggested_actions: vec![
                    format!("Send {} to {}", order_label(ctx), pick.id),
                    format!("Brief {} on {} prep", pick.id, ctx.required_capability),
                ],
                estimated_delay_mins: Some(
                    self.tuning
                        .queue_delay(pick)
                        .saturating_add(self.tuning.cross_training_penalty_mins),
                ),
            }),
            None => StrategyOutcome::Declined {
                examined: trained.iter().map(|c| c.id.clone()).collect(),
                reason: format!(
                    "no cross-trained {} resource has spare capacity",
                    ctx.required_capability
                ),
            },
        }
    }
}

/// Spread independent work units over several resources.
#[derive(Debug, Clone, Default)]
pub struct SplitAcrossResources {
    tuning: FallbackTuning,
}

impl SplitAcrossResources {
    pub const NAME: &'static str = "split_across_resources";

    pub fn new(tuning: FallbackTuning) -> Self {
        SplitAcrossResources { tuning }
    }
}

impl FallbackStrategy for SplitAcrossResources {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        30
    }

    fn condition(&self, ctx: &FallbackContext) -> bool {
        ctx.units.len() >= 2
    }

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome {
        let threshold = self.tuning.saturation_threshold;
        let mut used: BTreeSet<&str> = BTreeSet::new();
        let mut split = Vec::with_capacity(ctx.units.len());
        let mut delay = 0u32;

        for unit in &ctx.units {
            let eligible = ctx.fresh_candidates().filter(|c| {
                c.has_spare_capacity(threshold)
                    && !used.contains(c.id.as_str())
                    && c.capability_match(&unit.capability) != CapabilityMatch::None
            });
            let Some(pick) = least_loaded(eligible) else {
                return StrategyOutcome::Declined {
                    examined: Vec::new(),
                    reason: format!("no free resource can take {} ({})", unit.id, unit.capability),
                };
            };
            used.insert(pick.id.as_str());
            delay = delay.max(self.tuning.queue_delay(pick));
            split.push(SplitAssignment { unit_id: unit.id.clone(), resource_id: pick.id.clone() });
        }

        let resources: Vec<&str> = split.iter().map(|s| s.resource_id.as_str()).collect();
        StrategyOutcome::Resolved(FallbackResult {
            strategy: Self::NAME.to_string(),
            resolved_id: None,
            justification: format!("{} split over {}", order_label(ctx), resources.join(", ")),
            requires_manual_intervention: false,
            suggested_actions: split
                .iter()
                .map(|s| format!("Prepare {} on {}", s.unit_id, s.resource_id))
                .collect(),
            split,
            estimated_delay_mins: Some(delay),
        })
    }
}

/// Keep the work on the saturated target but move it up the queue.
#[derive(Debug, Clone, Default)]
pub struct QueueWithPriority {
    tuning: FallbackTuning,
}

impl QueueWithPriority {
    pub const NAME: &'static str = "queue_with_priority";

    pub fn new(tuning: FallbackTuning) -> Self {
        QueueWithPriority { tuning }
    }
}

impl FallbackStrategy for QueueWithPriority {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        40
    }

    /// Only a target that is up but busy can take a queued ticket.
    fn condition(&self, ctx: &FallbackContext) -> bool {
        ctx.target.available && !ctx.previous_attempts.contains(&ctx.target.id)
    }

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome {
        let target = &ctx.target;
        if target.queue_depth >= self.tuning.max_queue_depth {
            return StrategyOutcome::Declined {
                examined: vec![target.id.clone()],
                reason: format!("{} already has {} tickets queued", target.id, target.queue_depth),
            };
        }

        // A priority ticket jumps half the queue.
        let ahead = target.queue_depth.div_ceil(2);
        StrategyOutcome::Resolved(FallbackResult {
            strategy: Self::NAME.to_string(),
            resolved_id: Some(target.id.clone()),
            split: Vec::new(),
            justification: format!(
                "no alternative has capacity; {} queued on {} ahead of {} tickets",
                order_label(ctx),
                target.id,
                target.queue_depth - ahead
            ),
            requires_manual_intervention: false,
            suggested_actions: vec![
                format!("Mark {} as priority on {}", order_label(ctx), target.id),
                "Tell front of house about the delay".to_string(),
            ],
            estimated_delay_mins: Some(ahead.saturating_mul(self.tuning.minutes_per_queued_ticket)),
        })
    }
}

/// Terminal strategy. Always applies and always resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualIntervention;

impl ManualIntervention {
    pub const NAME: &'static str = "manual_intervention";

    pub fn build(&self, ctx: &FallbackContext) -> FallbackResult {
        let mut suggested = vec![
            format!("Ask the kitchen lead to reassign {}", order_label(ctx)),
            format!("Check whether {} is back in service", ctx.target.id),
        ];
        match ctx.failure {
            Some(ErrorCode::InsufficientQuantity) => {
                suggested.insert(0, "Offer the guest a substitute".to_string());
            }
            Some(ErrorCode::ResourceUnavailable) => {
                suggested.push(format!("Log an equipment issue for {}", ctx.target.id));
            }
            _ => {}
        }
        if ctx.units.len() >= 2 {
            suggested.push("Prepare the items separately as stations free up".to_string());
        }

        FallbackResult {
            strategy: Self::NAME.to_string(),
            resolved_id: None,
            split: Vec::new(),
            justification: format!(
                "no automatic alternative for {} after {} resource(s) tried",
                ctx.required_capability,
                ctx.previous_attempts.len()
            ),
            requires_manual_intervention: true,
            suggested_actions: suggested,
            estimated_delay_mins: None,
        }
    }
}

impl FallbackStrategy for ManualIntervention {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        u8::MAX
    }

    fn condition(&self, _ctx: &FallbackContext) -> bool {
        true
    }

    fn execute(&self, ctx: &FallbackContext) -> StrategyOutcome {
        StrategyOutcome::Resolved(self.build(ctx))
    }
}
