// src/solver/mod.rs

//! Dependency solver core
//!
//! Given an immutable snapshot of the candidate table, the solver encodes
//! candidates plus a policy as an integer linear program, hands it to an
//! ILP oracle, and either returns the selected candidates or recovers an
//! infeasible plan into a structured failure report.
//!
//! A solve call is single-threaded and synchronous: it owns its problem
//! and its oracle invocation end to end, and for a fixed candidate table,
//! candidate order and policy the emitted problem is identical across
//! runs.

mod blame;
mod oracle;
mod problem;

pub use blame::{FailureKind, FailureReport, SolveFailure};
pub use oracle::{BranchAndBound, BranchAndBoundOptions, MilpOracle, RawSolution};
pub use problem::{
    Constraint, ConstraintKind, ConstraintOp, Problem, BINARY_MIRROR_MARKER, DUMMY_COST,
};

use crate::candidate::Resolution;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Candidate selection policy
///
/// `Lazy` keeps whatever is already installed and otherwise prefers cheap
/// binaries; `Upgrade` prefers the newest version of every package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Lazy,
    Upgrade,
}

impl Policy {
    /// Parse a policy name from the configuration boundary
    pub fn parse(s: &str) -> Result<Policy> {
        match s {
            "lazy" => Ok(Policy::Lazy),
            "upgrade" => Ok(Policy::Upgrade),
            _ => Err(Error::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lazy => "lazy",
            Self::Upgrade => "upgrade",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Overall outcome of a solve call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolveStatus {
    Ok,
    Failed,
}

/// Result of a solve call
#[derive(Debug, Clone)]
pub struct SolutionResult {
    pub status: SolveStatus,
    /// Indices of selected candidates, in table order
    pub selected: Vec<usize>,
    /// The ILP problem that was solved
    pub problem: Problem,
    /// Raw oracle output
    pub raw: RawSolution,
    /// Failure report, present iff `status` is `Failed`
    pub failures: Option<FailureReport>,
}

impl SolutionResult {
    pub fn is_ok(&self) -> bool {
        self.status == SolveStatus::Ok
    }
}

/// The dependency solver
///
/// Owns the policy, the target library path and the ILP oracle. The
/// default oracle is the exact [`BranchAndBound`] minimizer; tests and
/// embedders may substitute their own through [`Solver::with_oracle`].
pub struct Solver {
    policy: Policy,
    library: Option<PathBuf>,
    oracle: Box<dyn MilpOracle>,
}

impl Solver {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            library: None,
            oracle: Box::new(BranchAndBound::new()),
        }
    }

    /// Set the target package library
    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    /// Replace the ILP oracle
    pub fn with_oracle(mut self, oracle: Box<dyn MilpOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Select a minimal consistent subset of candidates satisfying all
    /// direct requests and their transitive dependencies
    ///
    /// An infeasible plan is not an error: it is returned as a `Failed`
    /// result carrying a failure report. Errors abort the call without a
    /// partial result.
    pub fn solve(&self, resolution: &Resolution) -> Result<SolutionResult> {
        let library = self.library.as_ref().ok_or(Error::NoLibrary)?;
        if resolution.is_stale() {
            return Err(Error::StaleResolution);
        }

        debug!(
            "solving {} candidates with {} policy into {}",
            resolution.len(),
            self.policy,
            library.display()
        );

        let problem = Problem::build(resolution, self.policy);
        if problem.total() == 0 {
            return Ok(SolutionResult {
                status: SolveStatus::Ok,
                selected: Vec::new(),
                problem,
                raw: RawSolution::empty(),
                failures: None,
            });
        }

        let raw = self.oracle.solve(&problem)?;
        if raw.status != 0 {
            return Err(Error::OracleFailed { status: raw.status });
        }
        debug!(
            "oracle {} returned objective {}",
            self.oracle.name(),
            raw.objective
        );

        let selected: Vec<usize> = (0..problem.num_candidates)
            .filter(|&i| raw.assignment[i])
            .collect();

        if raw.objective >= DUMMY_COST - 1 {
            info!(
                "no consistent install plan, tracing blame across {} constraints",
                problem.conds.len()
            );
            let report = FailureReport::trace(resolution, &problem, &raw);
            return Ok(SolutionResult {
                status: SolveStatus::Failed,
                selected,
                problem,
                raw,
                failures: Some(report),
            });
        }

        Ok(SolutionResult {
            status: SolveStatus::Ok,
            selected,
            problem,
            raw,
            failures: None,
        })
    }
}
