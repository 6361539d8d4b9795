//! Multi-instruction generation
//!
//! Requests are resolved to instructions, missing dependencies are added, and
//! the dependency graph is layered into waves (Kahn). Each wave runs on the
//! worker pool; an instruction only starts once every dependency is
//! `Complete`, otherwise it ends `Blocked`. Results come back in request
//! order regardless of how the pool scheduled them.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::budget::SizeBudget;
use crate::config::GeneratorConfig;
use crate::contract::{Component, LinkSpec};
use crate::decompose::{MixingFunction, NibbleDecomposer};
use crate::error::{ExpressionTooLong, GenerationError};
use crate::isa::InstructionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionState {
    Pending,
    Generating,
    Complete,
    PartiallyFailed,
    /// A dependency ended in a state other than `Complete`
    Blocked,
}

impl InstructionState {
    /// States only move forward: `Pending -> Generating -> {Complete, PartiallyFailed}`
    /// or `Pending -> Blocked`.
    pub fn can_transition_to(&self, next: InstructionState) -> bool {
        matches!(
            (self, next),
            (InstructionState::Pending, InstructionState::Generating)
                | (InstructionState::Pending, InstructionState::Blocked)
                | (InstructionState::Generating, InstructionState::Complete)
                | (InstructionState::Generating, InstructionState::PartiallyFailed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstructionState::Complete | InstructionState::PartiallyFailed | InstructionState::Blocked
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstructionState::Pending => "pending",
            InstructionState::Generating => "generating",
            InstructionState::Complete => "complete",
            InstructionState::PartiallyFailed => "partially_failed",
            InstructionState::Blocked => "blocked",
        }
    }
}

/// Result of generating one instruction
#[derive(Debug, Clone)]
pub struct InstructionOutcome {
    pub instruction: InstructionKind,
    /// Added as a dependency rather than requested
    pub implicit: bool,
    pub state: InstructionState,
    /// Components within budget, in plan order
    pub accepted: Vec<Component>,
    pub rejected: Vec<ExpressionTooLong>,
    pub links: Vec<LinkSpec>,
    pub errors: Vec<GenerationError>,
    pub total_constraint_count: usize,
    pub max_expression_length: usize,
}

impl InstructionOutcome {
    fn blocked(instruction: InstructionKind, implicit: bool, dependency: InstructionKind) -> Self {
        Self {
            instruction,
            implicit,
            state: InstructionState::Blocked,
            accepted: Vec::new(),
            rejected: Vec::new(),
            links: Vec::new(),
            errors: vec![GenerationError::DependencyTimeout {
                instruction,
                dependency,
            }],
            total_constraint_count: 0,
            max_expression_length: 0,
        }
    }

    pub fn passed(&self) -> usize {
        self.accepted.len()
    }

    pub fn failed(&self) -> usize {
        self.rejected.len()
    }

    /// Every error for this instruction, budget rejections included
    pub fn all_errors(&self) -> Vec<GenerationError> {
        self.rejected
            .iter()
            .cloned()
            .map(GenerationError::from)
            .chain(self.errors.iter().cloned())
            .collect()
    }
}

/// Result of one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub width_nibbles: u8,
    pub max_expr_chars: usize,
    /// One entry per instruction, requested ones first, then implicit dependencies
    pub outcomes: Vec<InstructionOutcome>,
    /// Requests that did not name an instruction
    pub request_errors: Vec<GenerationError>,
    pub waves: Vec<Vec<InstructionKind>>,
}

impl BatchReport {
    pub fn outcome(&self, instruction: InstructionKind) -> Option<&InstructionOutcome> {
        self.outcomes.iter().find(|o| o.instruction == instruction)
    }

    pub fn is_success(&self) -> bool {
        self.request_errors.is_empty()
            && self
                .outcomes
                .iter()
                .all(|o| o.state == InstructionState::Complete)
    }

    pub fn count(&self, state: InstructionState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    pub fn total_components(&self) -> usize {
        self.outcomes.iter().map(|o| o.passed() + o.failed()).sum()
    }

    pub fn total_passed(&self) -> usize {
        self.outcomes.iter().map(InstructionOutcome::passed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes.iter().map(InstructionOutcome::failed).sum()
    }
}

pub struct Orchestrator {
    decomposer: NibbleDecomposer,
    budget: SizeBudget,
    pool: rayon::ThreadPool,
}

impl Orchestrator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let decomposer = NibbleDecomposer::new(config)?;
        Self::with_decomposer(config, decomposer)
    }

    pub fn with_decomposer(
        config: &GeneratorConfig,
        decomposer: NibbleDecomposer,
    ) -> Result<Self, GenerationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("nibble-worker-{}", i))
            .build()
            .map_err(|e| GenerationError::WorkerPool(e.to_string()))?;
        Ok(Self {
            decomposer,
            budget: SizeBudget::from_config(config),
            pool,
        })
    }

    /// Swaps the crypto mixing function
    pub fn with_mixer(mut self, mixer: Arc<dyn MixingFunction>) -> Self {
        self.decomposer = self.decomposer.with_mixer(mixer);
        self
    }

    pub fn decomposer(&self) -> &NibbleDecomposer {
        &self.decomposer
    }

    pub fn budget(&self) -> SizeBudget {
        self.budget
    }

    /// Generates every requested mnemonic. Unknown mnemonics are reported
    /// per request and never stop the batch.
    pub fn generate<S: AsRef<str>>(&self, requests: &[S]) -> BatchReport {
        let mut kinds = Vec::new();
        let mut request_errors = Vec::new();
        for request in requests {
            match request.as_ref().parse::<InstructionKind>() {
                Ok(kind) => kinds.push(kind),
                Err(err) => {
                    warn!(request = request.as_ref(), "unknown instruction");
                    request_errors.push(err);
                }
            }
        }
        let mut report = self.generate_kinds(&kinds);
        report.request_errors = request_errors;
        report
    }

    pub fn generate_kinds(&self, requested: &[InstructionKind]) -> BatchReport {
        let order = resolve(requested);
        let waves = schedule(&order);
        info!(
            instructions = order.len(),
            waves = waves.len(),
            "starting generation"
        );

        let implicit: BTreeMap<InstructionKind, bool> = order.iter().copied().collect();
        let mut states: BTreeMap<InstructionKind, InstructionState> = order
            .iter()
            .map(|(kind, _)| (*kind, InstructionState::Pending))
            .collect();
        let mut outcomes: BTreeMap<InstructionKind, InstructionOutcome> = BTreeMap::new();

        for (index, wave) in waves.iter().enumerate() {
            let mut ready = Vec::new();
            for &kind in wave {
                let failed_dependency = kind
                    .dependencies()
                    .iter()
                    .copied()
                    .find(|dep| states.get(dep) != Some(&InstructionState::Complete));
                let is_implicit = implicit.get(&kind).copied().unwrap_or(false);
                match failed_dependency {
                    Some(dependency) => {
                        warn!(%kind, %dependency, "dependency did not complete, blocking");
                        transition(&mut states, kind, InstructionState::Blocked);
                        outcomes.insert(kind, InstructionOutcome::blocked(kind, is_implicit, dependency));
                    }
                    None => {
                        transition(&mut states, kind, InstructionState::Generating);
                        ready.push((kind, is_implicit));
                    }
                }
            }

            debug!(wave = index, size = ready.len(), "running wave");
            let results: Vec<InstructionOutcome> = self.pool.install(|| {
                ready
                    .par_iter()
                    .map(|&(kind, is_implicit)| self.generate_one(kind, is_implicit))
                    .collect()
            });
            for outcome in results {
                transition(&mut states, outcome.instruction, outcome.state);
                outcomes.insert(outcome.instruction, outcome);
            }
        }

        let outcomes: Vec<InstructionOutcome> = order
            .iter()
            .filter_map(|(kind, _)| outcomes.remove(kind))
            .collect();
        let report = BatchReport {
            width_nibbles: self.decomposer.width_nibbles(),
            max_expr_chars: self.budget.limit(),
            outcomes,
            request_errors: Vec::new(),
            waves,
        };
        info!(
            complete = report.count(InstructionState::Complete),
            partially_failed = report.count(InstructionState::PartiallyFailed),
            blocked = report.count(InstructionState::Blocked),
            components = report.total_passed(),
            rejected = report.total_failed(),
            "generation finished"
        );
        report
    }

    /// Decomposes one instruction and sorts its components by the budget
    pub fn generate_one(&self, kind: InstructionKind, implicit: bool) -> InstructionOutcome {
        let plan = match self.decomposer.decompose(kind) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(%kind, error = %err, "decomposition failed");
                return InstructionOutcome {
                    instruction: kind,
                    implicit,
                    state: InstructionState::PartiallyFailed,
                    accepted: Vec::new(),
                    rejected: Vec::new(),
                    links: Vec::new(),
                    errors: vec![err],
                    total_constraint_count: 0,
                    max_expression_length: 0,
                };
            }
        };

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut max_expression_length = 0;
        for component in plan.components {
            match self.budget.check(&component) {
                Ok(length) => {
                    max_expression_length = max_expression_length.max(length);
                    accepted.push(component);
                }
                Err(err) => {
                    warn!(%kind, error = %err, "component rejected");
                    rejected.push(err);
                }
            }
        }

        let state = if rejected.is_empty() {
            InstructionState::Complete
        } else {
            InstructionState::PartiallyFailed
        };
        debug!(%kind, passed = accepted.len(), failed = rejected.len(), "instruction generated");

        InstructionOutcome {
            instruction: kind,
            implicit,
            state,
            accepted,
            rejected,
            links: plan.links,
            errors: Vec::new(),
            total_constraint_count: plan.total_constraint_count,
            max_expression_length,
        }
    }
}

fn transition(
    states: &mut BTreeMap<InstructionKind, InstructionState>,
    kind: InstructionKind,
    next: InstructionState,
) {
    if let Some(state) = states.get_mut(&kind) {
        debug_assert!(state.can_transition_to(next), "{kind}: {state:?} -> {next:?}");
        *state = next;
    }
}

/// Deduplicates requests and appends missing dependencies, flagged implicit
pub fn resolve(requested: &[InstructionKind]) -> Vec<(InstructionKind, bool)> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    for &kind in requested {
        if seen.insert(kind) {
            order.push((kind, false));
        }
    }
    let mut index = 0;
    while index < order.len() {
        let (kind, _) = order[index];
        for &dep in kind.dependencies() {
            if seen.insert(dep) {
                debug!(%kind, %dep, "adding implicit dependency");
                order.push((dep, true));
            }
        }
        index += 1;
    }
    order
}

/// Kahn layering: each wave holds instructions whose dependencies are all in
/// earlier waves, in `order` order.
pub fn schedule(order: &[(InstructionKind, bool)]) -> Vec<Vec<InstructionKind>> {
    let members: BTreeSet<InstructionKind> = order.iter().map(|(k, _)| *k).collect();
    let mut remaining: Vec<InstructionKind> = order.iter().map(|(k, _)| *k).collect();
    let mut placed = BTreeSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (wave, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|kind| {
            kind.dependencies()
                .iter()
                .all(|dep| !members.contains(dep) || placed.contains(dep))
        });
        if wave.is_empty() {
            // Unreachable with a static acyclic table; keep whatever is left together
            waves.push(rest);
            break;
        }
        placed.extend(wave.iter().copied());
        waves.push(wave);
        remaining = rest;
    }
    waves
}
