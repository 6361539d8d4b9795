//! Batch generation, emission and read-back

use nibble_compose::contract::Expr;
use nibble_compose::decompose::MixingFunction;
use nibble_compose::manifest::MANIFEST_FILE;
use nibble_compose::parser::ParsedQuery;
use nibble_compose::solver::BuiltinBackend;
use nibble_compose::{
    ComponentEmitter, GeneratorConfig, InstructionKind, InstructionState, Manifest, NibbleDecomposer,
    Orchestrator, SolverBackend,
};
use std::fs;
use std::sync::Arc;
use walkdir::WalkDir;

/// Every output bit is the OR of every state/input bit pair: correct, but far
/// too long for the budget
#[derive(Debug)]
struct BloatedMix;

impl MixingFunction for BloatedMix {
    fn name(&self) -> &str {
        "bloated"
    }

    fn mix(&self, state: [Expr; 4], input: [Expr; 4]) -> [Expr; 4] {
        let pairs = || {
            state
                .iter()
                .flat_map(|s| input.iter().map(move |i| Expr::and(s.clone(), i.clone())))
                .collect::<Vec<_>>()
        };
        [Expr::any(pairs()), Expr::any(pairs()), Expr::any(pairs()), Expr::any(pairs())]
    }

    fn reference(&self, state: u8, input: u8) -> u8 {
        if state & 0xF != 0 && input & 0xF != 0 {
            0xF
        } else {
            0
        }
    }
}

fn all_mnemonics() -> Vec<&'static str> {
    InstructionKind::ALL.iter().map(|k| k.mnemonic()).collect()
}

#[test]
fn every_instruction_completes_within_budget() {
    let config = GeneratorConfig::default();
    let report = Orchestrator::new(&config).unwrap().generate(all_mnemonics().as_slice());

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), InstructionKind::ALL.len());
    assert!(report.outcomes.iter().all(|o| !o.implicit));
    for outcome in &report.outcomes {
        assert_eq!(outcome.state, InstructionState::Complete, "{}", outcome.instruction);
        assert!(outcome.max_expression_length <= config.max_expr_chars);
        for component in &outcome.accepted {
            assert!(component.contract.expression_length() <= config.max_expr_chars);
        }
    }
}

#[test]
fn bitwise_instructions_are_eight_independent_components() {
    let report = Orchestrator::new(&GeneratorConfig::default())
        .unwrap()
        .generate(&["AND", "OR", "XOR", "NOT"]);
    for outcome in &report.outcomes {
        assert_eq!(outcome.passed(), 8, "{}", outcome.instruction);
        assert!(outcome.links.is_empty());
    }
    assert_eq!(report.waves.len(), 1);
}

#[test]
fn oversized_crypto_components_fail_alone() {
    let report = Orchestrator::new(&GeneratorConfig::default())
        .unwrap()
        .with_mixer(Arc::new(BloatedMix))
        .generate(&["ADD", "HASH", "SIGN", "EQ"]);

    let plan = NibbleDecomposer::with_width(8)
        .unwrap()
        .with_mixer(Arc::new(BloatedMix))
        .decompose(InstructionKind::Hash)
        .unwrap();
    let oversized: Vec<&str> = plan
        .components
        .iter()
        .filter(|c| c.contract.expression_length() > 700)
        .map(|c| c.name())
        .collect();
    assert!(!oversized.is_empty());

    let hash = report.outcome(InstructionKind::Hash).unwrap();
    assert_eq!(hash.state, InstructionState::PartiallyFailed);
    // One rejection per oversized component, every sibling still accepted
    let rejected: Vec<&str> = hash.rejected.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(rejected, oversized);
    assert_eq!(hash.accepted.len() + hash.rejected.len(), plan.components.len());
    assert!(hash.rejected.iter().all(|r| r.actual_length > 700 && r.limit == 700));

    assert_eq!(
        report.outcome(InstructionKind::Sign).unwrap().state,
        InstructionState::PartiallyFailed
    );
    assert_eq!(report.outcome(InstructionKind::Add).unwrap().state, InstructionState::Complete);
    assert_eq!(report.outcome(InstructionKind::Eq).unwrap().state, InstructionState::Complete);
    assert!(!report.is_success());
}

#[test]
fn outcomes_follow_request_order_for_any_worker_count() {
    let requests = ["JNZ", "SUB", "GTE", "JZ", "PUSH"];
    for workers in [1, 3, 8] {
        let config = GeneratorConfig {
            workers,
            ..GeneratorConfig::default()
        };
        let report = Orchestrator::new(&config).unwrap().generate(&requests);
        let order: Vec<_> = report.outcomes.iter().map(|o| o.instruction.mnemonic()).collect();
        assert_eq!(order, vec!["JNZ", "SUB", "GTE", "JZ", "PUSH", "NEQ", "EQ"]);
        assert!(report.outcomes[5].implicit && report.outcomes[6].implicit);
        assert_eq!(report.waves.len(), 2);
    }
}

#[test]
fn emission_is_deterministic() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    for (dir, workers) in [(&first, 1), (&second, 8)] {
        let config = GeneratorConfig {
            workers,
            ..GeneratorConfig::default()
        };
        let report = Orchestrator::new(&config).unwrap().generate(all_mnemonics().as_slice());
        ComponentEmitter::new(dir.path()).emit(&report).unwrap();
    }

    let manifest_a = fs::read_to_string(first.path().join(MANIFEST_FILE)).unwrap();
    let manifest_b = fs::read_to_string(second.path().join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest_a, manifest_b);

    let manifest = Manifest::load(first.path()).unwrap();
    for (_, file) in manifest.files() {
        let a = fs::read(first.path().join(&file.path)).unwrap();
        let b = fs::read(second.path().join(&file.path)).unwrap();
        assert_eq!(a, b, "{}", file.path);
    }
}

#[test]
fn emitted_queries_read_back_and_solve() {
    let dir = tempfile::tempdir().unwrap();
    let report = Orchestrator::new(&GeneratorConfig::default())
        .unwrap()
        .generate(&["ADD", "JZ", "VERIFY", "MSTORE"]);
    let summary = ComponentEmitter::new(dir.path()).emit(&report).unwrap();
    assert_eq!(summary.written, report.total_passed());

    let backend = BuiltinBackend::new();
    let mut seen = 0;
    for entry in WalkDir::new(dir.path()) {
        let entry = entry.unwrap();
        if entry.path().extension().and_then(|e| e.to_str()) != Some("tau") {
            continue;
        }
        let text = fs::read_to_string(entry.path()).unwrap();
        let parsed = ParsedQuery::parse(&text).unwrap();
        assert!(parsed.name.is_some());
        assert!(backend.check_file(entry.path()).unwrap().is_satisfiable(), "{}", entry.path().display());
        seen += 1;
    }
    assert_eq!(seen, report.total_passed());

    // A restart over the same directory rewrites nothing
    let again = ComponentEmitter::new(dir.path()).emit(&report).unwrap();
    assert_eq!(again.written, 0);
    assert_eq!(again.unchanged, seen);
}

#[test]
fn unknown_requests_are_reported_in_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let report = Orchestrator::new(&GeneratorConfig::default())
        .unwrap()
        .generate(&["ADD", "MUL"]);
    let summary = ComponentEmitter::new(dir.path()).emit(&report).unwrap();
    assert_eq!(summary.manifest.rejected_requests.len(), 1);
    assert!(summary.manifest.rejected_requests[0].message.contains("MUL"));
    assert_eq!(summary.manifest.instructions.len(), 1);
}
