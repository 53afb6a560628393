// src/solver/blame.rs

//! Failure attribution for infeasible install plans
//!
//! When the oracle's objective shows that at least one slack variable was
//! chosen, the constraints are replayed against the raw solution to
//! reconstruct a per-candidate failure state, dependency failures are
//! propagated to a fixed point, and the result is condensed into a report
//! that traces blame from each failed direct request down to the innermost
//! unresolvable dependency.

use crate::candidate::{RemoteSpec, Resolution};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::oracle::RawSolution;
use super::problem::{ConstraintKind, Problem};

/// Per-candidate state while replaying the constraints
///
/// Every candidate starts as `MaybeGood` and ends in exactly one terminal
/// state: chosen (`Installed`), one of the failure states, or `CouldBe`
/// for viable candidates the oracle did not pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateState {
    MaybeGood,
    Installed,
    FailedRes,
    SatisfyDirect,
    Conflict,
    DepFailed,
    CouldBe,
}

impl CandidateState {
    fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FailedRes | Self::SatisfyDirect | Self::Conflict | Self::DepFailed
        )
    }

    fn failure_kind(self) -> Option<FailureKind> {
        match self {
            Self::FailedRes => Some(FailureKind::FailedRes),
            Self::SatisfyDirect => Some(FailureKind::SatisfyDirect),
            Self::Conflict => Some(FailureKind::Conflict),
            Self::DepFailed => Some(FailureKind::DepFailed),
            _ => None,
        }
    }
}

/// Why a candidate could not be part of the install plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Upstream resolution of the candidate failed
    FailedRes,
    /// The candidate cannot satisfy a direct request for its package
    SatisfyDirect,
    /// A different candidate of the same package was selected
    Conflict,
    /// A dependency has no installable candidate left
    DepFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FailedRes => "failed-res",
            Self::SatisfyDirect => "satisfy-direct",
            Self::Conflict => "conflict",
            Self::DepFailed => "dep-failed",
        };
        write!(f, "{}", s)
    }
}

/// One failed candidate with its collected diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct SolveFailure {
    /// Candidate index in the table
    pub candidate: usize,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub package: String,
    pub direct: bool,
    pub kind: FailureKind,
    /// Human-readable notes attached while replaying constraints
    pub messages: Vec<String>,
    /// Refs of dependencies whose installation is unreachable
    pub downstream: Vec<String>,
}

/// Structured explanation of an infeasible install plan
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub failures: Vec<SolveFailure>,
}

impl FailureReport {
    /// Replay the constraints against the raw solution and attribute blame
    pub fn trace(resolution: &Resolution, problem: &Problem, raw: &RawSolution) -> FailureReport {
        let candidates = resolution.candidates();
        let n = problem.num_candidates;
        let mut state = vec![CandidateState::MaybeGood; n];
        let mut notes: Vec<Vec<String>> = vec![Vec::new(); n];
        let mut downstream: Vec<Vec<String>> = vec![Vec::new(); n];

        debug!("tracing blame for infeasible plan, objective {}", raw.objective);

        // candidates the oracle chose
        for (i, s) in state.iter_mut().enumerate() {
            if raw.assignment[i] {
                *s = CandidateState::Installed;
            }
        }

        // failed resolutions
        for cond in &problem.conds {
            if let ConstraintKind::OkResolution { candidate } = &cond.kind {
                state[*candidate] = CandidateState::FailedRes;
                let msg = candidates[*candidate].error.clone().unwrap_or_else(|| {
                    format!("Resolution of {} failed", candidates[*candidate].ref_)
                });
                notes[*candidate].push(msg);
            }
        }

        // candidates that cannot satisfy a direct request
        for cond in &problem.conds {
            if let ConstraintKind::SatisfyRefs { wanted } = &cond.kind {
                let v = cond.vars[0];
                state[v] = CandidateState::SatisfyDirect;
                notes[v].push(format!(
                    "Conflicts with requested {}",
                    candidates[*wanted].ref_
                ));
            }
        }

        // losers of at-most-once constraints with a selected winner
        for cond in &problem.conds {
            if let ConstraintKind::AtMostOnce { .. } = &cond.kind {
                let Some(winner) = cond.vars.iter().copied().find(|&v| raw.assignment[v]) else {
                    continue;
                };
                for &v in &cond.vars {
                    if v != winner {
                        state[v] = CandidateState::Conflict;
                        notes[v].push(format!("Conflicts with {}", candidates[winner].ref_));
                    }
                }
            }
        }

        // dependency failures, propagated to a fixed point
        let mut pairs: Vec<(usize, String, String, Vec<usize>)> = problem
            .conds
            .iter()
            .filter_map(|cond| match &cond.kind {
                ConstraintKind::Dependency {
                    upstream,
                    dep_ref,
                    good_cand,
                    message,
                    ..
                } => Some((*upstream, dep_ref.clone(), message.clone(), good_cand.clone())),
                _ => None,
            })
            .collect();

        for (up, dep_ref, message, good) in &pairs {
            if good.is_empty() && state[*up] == CandidateState::MaybeGood {
                state[*up] = CandidateState::DepFailed;
                notes[*up].push(message.clone());
                downstream[*up].push(dep_ref.clone());
            }
        }

        loop {
            let fails: HashSet<usize> = (0..n).filter(|&i| state[i].is_failure()).collect();
            let mut changed = false;

            for (up, dep_ref, message, good) in &mut pairs {
                if good.iter().any(|j| fails.contains(j)) {
                    good.retain(|j| !fails.contains(j));
                }
                if good.is_empty() && state[*up] == CandidateState::MaybeGood {
                    state[*up] = CandidateState::DepFailed;
                    notes[*up].push(message.clone());
                    downstream[*up].push(dep_ref.clone());
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        // viable but not chosen
        for s in state.iter_mut() {
            if *s == CandidateState::MaybeGood {
                *s = CandidateState::CouldBe;
            }
        }

        let failures = (0..n)
            .filter_map(|i| {
                state[i].failure_kind().map(|kind| SolveFailure {
                    candidate: i,
                    ref_: candidates[i].ref_.clone(),
                    package: candidates[i].package.clone(),
                    direct: candidates[i].direct,
                    kind,
                    messages: notes[i].clone(),
                    downstream: downstream[i].clone(),
                })
            })
            .collect();

        FailureReport { failures }
    }

    /// Failures of directly requested candidates
    pub fn direct_failures(&self) -> impl Iterator<Item = &SolveFailure> {
        self.failures.iter().filter(|f| f.direct)
    }

    /// Render the report as nested bullets, walking from each failed
    /// direct request down its unreachable dependencies
    pub fn format(&self) -> String {
        let mut out = String::new();
        let mut seen: HashSet<usize> = HashSet::new();
        for failure in self.direct_failures() {
            self.render(failure, 0, &mut seen, &mut out);
        }
        out
    }

    fn render(
        &self,
        failure: &SolveFailure,
        depth: usize,
        seen: &mut HashSet<usize>,
        out: &mut String,
    ) {
        if !seen.insert(failure.candidate) {
            return;
        }

        let indent = "  ".repeat(depth);
        if failure.messages.is_empty() {
            out.push_str(&format!("{}* {}: {}\n", indent, failure.ref_, failure.kind));
        } else {
            out.push_str(&format!(
                "{}* {}: {}\n",
                indent,
                failure.ref_,
                failure.messages.join("; ")
            ));
        }

        for dep_ref in &failure.downstream {
            let spec = RemoteSpec::parse(dep_ref);
            for child in self
                .failures
                .iter()
                .filter(|c| c.ref_ == *dep_ref || c.package == spec.package)
            {
                self.render(child, depth + 1, seen, out);
            }
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, CandidateSource, DepEdge, DepKind};
    use crate::solver::{BranchAndBound, MilpOracle, Policy, Problem};
    use crate::version::{PkgVersion, VersionReq};

    fn ver(s: &str) -> PkgVersion {
        PkgVersion::parse(s).unwrap()
    }

    fn cran(r: &str, name: &str, version: &str) -> Candidate {
        Candidate::new(r, name, CandidateSource::Cran).with_version(ver(version))
    }

    fn run(res: &Resolution) -> FailureReport {
        let problem = Problem::build(res, Policy::Lazy);
        let raw = BranchAndBound::new().solve(&problem).unwrap();
        FailureReport::trace(res, &problem, &raw)
    }

    #[test]
    fn test_failed_resolution_uses_resolver_error() {
        let res = Resolution::new(vec![Candidate::new("cran::A", "A", CandidateSource::Cran)
            .as_direct()
            .failed("cannot find package A")]);

        let report = run(&res);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::FailedRes);
        assert_eq!(report.failures[0].messages, vec!["cannot find package A"]);
    }

    #[test]
    fn test_unsatisfiable_version_blames_upstream_only() {
        let res = Resolution::new(vec![
            cran("cran::A", "A", "1.0")
                .as_direct()
                .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)
                    .with_req(VersionReq::parse(">= 2.0").unwrap())]),
            cran("cran::B", "B", "1.0"),
        ]);

        let report = run(&res);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.ref_, "cran::A");
        assert_eq!(failure.kind, FailureKind::DepFailed);
        assert_eq!(failure.messages, vec!["Cannot install dependency B (>= 2.0)"]);
        assert_eq!(failure.downstream, vec!["B"]);
    }

    #[test]
    fn test_transitive_failure_chain() {
        let res = Resolution::new(vec![
            cran("cran::A", "A", "1.0")
                .as_direct()
                .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)]),
            cran("cran::B", "B", "1.0").with_deps(vec![DepEdge::new("C", "C", DepKind::Imports)]),
            Candidate::new("cran::C", "C", CandidateSource::Cran).failed("download failed"),
        ]);

        let report = run(&res);
        let kinds: Vec<(&str, FailureKind)> = report
            .failures
            .iter()
            .map(|f| (f.ref_.as_str(), f.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("cran::A", FailureKind::DepFailed),
                ("cran::B", FailureKind::DepFailed),
                ("cran::C", FailureKind::FailedRes),
            ]
        );

        let rendered = report.format();
        assert!(rendered.contains("cran::A"));
        assert!(rendered.contains("cran::B"));
        assert!(rendered.contains("download failed"));
    }

    #[test]
    fn test_conflict_marks_losing_peer() {
        let res = Resolution::new(vec![
            cran("cran::A", "A", "1.0")
                .as_direct()
                .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)
                    .with_req(VersionReq::parse(">= 2.0").unwrap())]),
            cran("cran::C", "C", "1.0")
                .as_direct()
                .with_deps(vec![DepEdge::new("B", "B", DepKind::Imports)
                    .with_req(VersionReq::parse("< 2.0").unwrap())]),
            cran("cran::B@2.0", "B", "2.0"),
            cran("cran::B@1.0", "B", "1.0"),
        ]);

        let report = run(&res);
        let loser = report
            .failures
            .iter()
            .find(|f| f.ref_ == "cran::B@1.0")
            .expect("losing peer reported");
        assert_eq!(loser.kind, FailureKind::Conflict);
        assert_eq!(loser.messages, vec!["Conflicts with cran::B@2.0"]);

        let starved = report
            .failures
            .iter()
            .find(|f| f.ref_ == "cran::C")
            .expect("starved direct reported");
        assert_eq!(starved.kind, FailureKind::DepFailed);
        assert_eq!(starved.downstream, vec!["B"]);
    }

    #[test]
    fn test_satisfy_direct_state() {
        // two direct requests for the same package from incompatible
        // sources rule each other's candidates out
        let res = Resolution::new(vec![
            Candidate::new("github::u/A@sha", "A", CandidateSource::Github)
                .with_version(ver("1.0"))
                .as_direct(),
            cran("cran::A", "A", "1.0").as_direct(),
        ]);

        let report = run(&res);
        let github = report
            .failures
            .iter()
            .find(|f| f.ref_ == "github::u/A@sha")
            .expect("github candidate reported");
        assert_eq!(github.kind, FailureKind::SatisfyDirect);
        assert_eq!(github.messages, vec!["Conflicts with requested cran::A"]);

        let cran_side = report
            .failures
            .iter()
            .find(|f| f.ref_ == "cran::A")
            .expect("cran candidate reported");
        assert_eq!(cran_side.kind, FailureKind::SatisfyDirect);
        assert_eq!(
            cran_side.messages,
            vec!["Conflicts with requested github::u/A@sha"]
        );
    }

    #[test]
    fn test_report_serializes_kebab_case() {
        let res = Resolution::new(vec![Candidate::new("cran::A", "A", CandidateSource::Cran)
            .as_direct()
            .failed("gone")]);

        let report = run(&res);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""kind":"failed-res""#));
        assert!(json.contains(r#""ref":"cran::A""#));
    }
}
