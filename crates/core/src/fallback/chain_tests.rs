// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

fn origin() -> FallbackOrigin {
    FallbackOrigin {
        operation: "resource_assignment".to_string(),
        order_id: Some("O7".to_string()),
    }
}

fn grill(id: &str, utilization: f64) -> ResourceCandidate {
    ResourceCandidate::new(id, "grill", utilization)
}

#[test]
fn saturated_target_routes_to_same_capability_alternate() {
    let ctx = FallbackContext::new(grill("grill-1", 100.0), vec![grill("grill-2", 40.0)], origin());

    let result = FallbackChain::default().resolve(ctx);

    assert_eq!(result.strategy, "alternate_same_capability");
    assert_eq!(result.resolved_id.as_deref(), Some("grill-2"));
    assert!(!result.requires_manual_intervention);
    assert!(result.justification.contains("grill-2"));
}

#[test]
fn strategies_run_in_priority_order() {
    let chain = FallbackChain::new(vec![
        Box::new(ManualIntervention),
        Box::new(QueueWithPriority::default()),
        Box::new(AlternateSameCapability::default()),
    ]);
    assert_eq!(
        chain.strategy_names(),
        vec!["alternate_same_capability", "queue_with_priority", "manual_intervention"]
    );
}

#[test]
fn default_chain_names() {
    assert_eq!(
        FallbackChain::default().strategy_names(),
        vec![
            "alternate_same_capability",
            "cross_trained",
            "split_across_resources",
            "queue_with_priority",
            "manual_intervention",
        ]
    );
}

#[test]
fn no_candidates_and_unavailable_target_ends_in_manual_intervention() {
    let ctx = FallbackContext::new(grill("grill-1", 100.0).unavailable(), Vec::new(), origin())
        .with_failure(ErrorCode::ResourceUnavailable);

    let resolution = FallbackChain::default().resolve_traced(ctx);

    assert!(resolution.result.requires_manual_intervention);
    assert_eq!(resolution.result.strategy, "manual_intervention");
    assert!(!resolution.result.suggested_actions.is_empty());
    assert_eq!(resolution.trace.first(), Some(&ResolutionStep::Pending));
    assert_eq!(
        resolution.trace.last(),
        Some(&ResolutionStep::ManualIntervention { strategy: "manual_intervention" })
    );
}

#[test]
fn previously_attempted_resources_are_never_offered() {
    let ctx = FallbackContext::new(
        grill("grill-1", 100.0),
        vec![grill("grill-2", 10.0), grill("grill-3", 60.0)],
        origin(),
    )
    .with_previous_attempt("grill-2");

    let result = FallbackChain::default().resolve(ctx);

    assert_eq!(result.resolved_id.as_deref(), Some("grill-3"));
}

#[test]
fn previously_used_strategies_are_skipped() {
    let candidates = vec![grill("grill-2", 40.0)];
    let mut ctx = FallbackContext::new(grill("grill-1", 100.0), candidates, origin());
    ctx.previous_strategies.insert("alternate_same_capability".to_string());

    let resolution = FallbackChain::default().resolve_traced(ctx);

    assert_eq!(resolution.result.strategy, "queue_with_priority");
    assert!(resolution.trace.contains(&ResolutionStep::Skipped {
        strategy: "alternate_same_capability",
        reason: "already tried".to_string(),
    }));
}

#[test]
fn declined_resources_accumulate_into_attempted() {
    let ctx = FallbackContext::new(
        grill("grill-1", 100.0).with_queue_depth(20),
        vec![grill("grill-2", 95.0), grill("grill-3", 90.0)],
        origin(),
    );

    let resolution = FallbackChain::default().resolve_traced(ctx);

    assert!(resolution.result.requires_manual_intervention);
    assert!(resolution.attempted.contains("grill-2"));
    assert!(resolution.attempted.contains("grill-3"));
    assert!(resolution.attempted.contains("grill-1"));
}

/// Ignores the attempted set and always offers the same resource.
struct Stubborn;

impl FallbackStrategy for Stubborn {
    fn name(&self) -> &'static str {
        "stubborn"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn condition(&self, _ctx: &FallbackContext) -> bool {
        true
    }

    fn execute(&self, _ctx: &FallbackContext) -> StrategyOutcome {
        StrategyOutcome::Resolved(FallbackResult {
            strategy: "stubborn".to_string(),
            resolved_id: Some("grill-2".to_string()),
            split: Vec::new(),
            justification: "always grill-2".to_string(),
            requires_manual_intervention: false,
            suggested_actions: Vec::new(),
            estimated_delay_mins: None,
        })
    }
}

#[test]
fn chain_rejects_result_reusing_attempted_resource() {
    let chain = FallbackChain::new(vec![Box::new(Stubborn)]);
    let ctx = FallbackContext::new(grill("grill-1", 100.0), vec![grill("grill-2", 10.0)], origin())
        .with_previous_attempt("grill-2");

    let resolution = chain.resolve_traced(ctx);

    // The chain has no terminal strategy registered but still resolves.
    assert!(resolution.result.requires_manual_intervention);
    assert!(matches!(resolution.trace[2], ResolutionStep::Declined { strategy: "stubborn", .. }));
}

#[test]
fn empty_chain_still_resolves() {
    let chain = FallbackChain::new(Vec::new());
    let ctx = FallbackContext::new(grill("grill-1", 50.0), Vec::new(), origin());
    assert!(chain.resolve(ctx).requires_manual_intervention);
}

#[test]
fn validate_rejects_out_of_range_utilization() {
    let candidates = vec![grill("grill-2", 140.0)];
    let ctx = FallbackContext::new(grill("grill-1", 100.0), candidates, origin());
    assert!(ctx.validate().is_err());

    let ctx = FallbackContext::new(grill("", 10.0), Vec::new(), origin());
    assert!(ctx.validate().is_err());

    let ctx = FallbackContext::new(grill("grill-1", 100.0), vec![grill("grill-2", 40.0)], origin());
    assert!(ctx.validate().is_ok());
}

#[test]
fn context_round_trips_through_json() {
    let ctx = FallbackContext::new(
        grill("grill-1", 100.0),
        vec![grill("grill-2", 40.0).with_secondary("fryer")],
        origin(),
    )
    .with_priority(3);
    let json = serde_json::to_string(&ctx).unwrap();
    let back: FallbackContext = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ctx);
}
