// tests/solver_scenarios.rs

//! End-to-end solver scenarios through the public API.

mod common;

use common::{binary, cran, installed, req, solver, ver};
use pkgsolve::{
    Candidate, CandidateSource, ConstraintKind, DepEdge, DepKind, FailureKind, Policy, Resolution,
    ResolutionStatus, SolveStatus,
};

#[test]
fn trivial_installed_candidate_is_selected() {
    let res = Resolution::new(vec![installed("A", "1.0", None).as_direct()]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![0]);
    assert_eq!(result.raw.objective, 0);
}

#[test]
fn binary_is_preferred_over_source() {
    let res = Resolution::new(vec![
        cran("cran::A", "A", "1.0").as_direct(),
        binary(cran("cran::A", "A", "1.0")),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![1]);
    assert!(result
        .problem
        .conds
        .iter()
        .any(|c| matches!(c.kind, ConstraintKind::PreferBinary { .. })));
}

#[test]
fn upgrade_policy_selects_newest_version() {
    let res = Resolution::new(vec![
        binary(cran("cran::A@1.0", "A", "1.0")).as_direct(),
        binary(cran("cran::A@2.0", "A", "2.0")),
        binary(cran("cran::A@3.0", "A", "3.0")),
    ]);

    let result = solver(Policy::Upgrade).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![2]);
}

#[test]
fn lazy_policy_breaks_version_ties_by_table_order() {
    let res = Resolution::new(vec![
        binary(cran("cran::A@1.0", "A", "1.0")).as_direct(),
        binary(cran("cran::A@2.0", "A", "2.0")),
        binary(cran("cran::A@3.0", "A", "3.0")),
    ]);

    // all binaries cost 1 under lazy; the default oracle resolves the tie
    // deterministically for a fixed input order
    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![0]);
}

#[test]
fn version_conflict_blames_the_dependent() {
    let res = Resolution::new(vec![
        cran("cran::A", "A", "1.0")
            .as_direct()
            .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports).with_req(req(">= 2.0"))]),
        cran("cran::B", "B", "1.0"),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Failed);

    let report = result.failures.expect("failure report");
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.ref_, "cran::A");
    assert_eq!(failure.kind, FailureKind::DepFailed);
    assert_eq!(failure.downstream, vec!["B"]);
    assert!(failure.messages[0].contains(">= 2.0"));
}

#[test]
fn transitive_failure_walks_the_chain() {
    let res = Resolution::new(vec![
        cran("cran::A", "A", "1.0")
            .as_direct()
            .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)]),
        cran("cran::B", "B", "1.0").with_deps(vec![DepEdge::new("C", "C", DepKind::Imports)]),
        Candidate::new("cran::C", "C", CandidateSource::Cran).failed("download of C failed"),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Failed);

    let report = result.failures.expect("failure report");
    let kind_of = |r: &str| {
        report
            .failures
            .iter()
            .find(|f| f.ref_ == r)
            .map(|f| f.kind)
            .expect("failure present")
    };
    assert_eq!(kind_of("cran::A"), FailureKind::DepFailed);
    assert_eq!(kind_of("cran::B"), FailureKind::DepFailed);
    assert_eq!(kind_of("cran::C"), FailureKind::FailedRes);

    let rendered = report.format();
    assert!(rendered.contains("cran::A"));
    assert!(rendered.contains("cran::B"));
    assert!(rendered.contains("download of C failed"));
}

#[test]
fn conflicting_direct_requests_use_the_slack() {
    let res = Resolution::new(vec![
        Candidate::new("github::u/A@sha", "A", CandidateSource::Github)
            .with_version(ver("1.0"))
            .as_direct(),
        cran("cran::A", "A", "1.0").as_direct(),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Failed);
    // the single slack variable for package A must be chosen
    assert!(result.raw.assignment[result.problem.num_candidates]);

    let report = result.failures.expect("failure report");
    assert!(report
        .failures
        .iter()
        .any(|f| f.kind == FailureKind::SatisfyDirect));
}

#[test]
fn empty_candidate_table_is_ok() {
    let res = Resolution::new(vec![]);
    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert!(result.selected.is_empty());
    assert_eq!(result.problem.total(), 0);
}

#[test]
fn all_failed_candidates_fail_every_direct_package() {
    let res = Resolution::new(vec![
        Candidate::new("cran::A", "A", CandidateSource::Cran)
            .as_direct()
            .failed("A is archived"),
        Candidate::new("cran::B", "B", CandidateSource::Cran)
            .as_direct()
            .failed("B is archived"),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Failed);

    let report = result.failures.expect("failure report");
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.kind == FailureKind::FailedRes));

    // both slack variables chosen
    let n = result.problem.num_candidates;
    assert!(result.raw.assignment[n]);
    assert!(result.raw.assignment[n + 1]);
}

#[test]
fn selected_candidates_satisfy_their_dependencies() {
    let res = Resolution::new(vec![
        installed("A", "1.0", None).as_direct(),
        binary(cran("cran::B", "B", "1.0"))
            .as_direct()
            .with_deps(vec![DepEdge::new("C", "C", DepKind::Imports).with_req(req(">= 1.2"))]),
        cran("cran::C@1.1", "C", "1.1"),
        cran("cran::C@1.3", "C", "1.3"),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![0, 1, 3]);

    // every selected candidate resolved cleanly
    for &i in &result.selected {
        assert_eq!(res.candidates()[i].status, ResolutionStatus::Ok);
    }

    // lazy objective: installed 0 + binary 1 + source 5
    assert_eq!(result.raw.objective, 6);
}

#[test]
fn prefer_installed_rules_out_registry_duplicate() {
    let res = Resolution::new(vec![
        installed("A", "1.0", Some(pkgsolve::RepoType::Cran)),
        Candidate::new("A", "A", CandidateSource::Standard)
            .with_version(ver("1.0"))
            .as_direct(),
    ]);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    // the registry duplicate was ruled out in favor of the installed copy
    assert_eq!(result.selected, vec![0]);
    assert!(result
        .problem
        .conds
        .iter()
        .any(|c| matches!(c.kind, ConstraintKind::PreferInstalled { .. })));
}

#[test]
fn solving_twice_returns_identical_selections() {
    let res = Resolution::new(vec![
        cran("cran::A", "A", "1.0")
            .as_direct()
            .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)]),
        cran("cran::B@1.0", "B", "1.0"),
        binary(cran("cran::B@2.0", "B", "2.0")),
    ]);

    let s = solver(Policy::Upgrade);
    let first = s.solve(&res).unwrap();
    let second = s.solve(&res).unwrap();
    assert_eq!(first.selected, second.selected);
    assert_eq!(first.problem, second.problem);
}

#[test]
fn candidate_table_round_trips_through_json() {
    let json = r#"[
        {
            "ref": "cran::A",
            "package": "A",
            "version": "1.0",
            "type": "cran",
            "direct": true,
            "status": "OK",
            "deps": [
                {"ref": "B", "package": "B", "kind": "imports"}
            ]
        },
        {
            "ref": "cran::B",
            "package": "B",
            "version": "2.1.0",
            "type": "cran",
            "platform": {"binary": "x86_64-pc-linux-gnu"},
            "status": "OK"
        }
    ]"#;

    let candidates: Vec<Candidate> = serde_json::from_str(json).unwrap();
    let res = Resolution::new(candidates);

    let result = solver(Policy::Lazy).solve(&res).unwrap();
    assert_eq!(result.status, SolveStatus::Ok);
    assert_eq!(result.selected, vec![0, 1]);
}
