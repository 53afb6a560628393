// src/lib.rs

//! pkgsolve: dependency solver core of a package installation planner
//!
//! Given a pre-computed resolution (a flat table of candidate package
//! artifacts from registries, binary mirrors, local installations and
//! source repositories), the solver selects a minimal, mutually
//! consistent subset of candidates that satisfies all direct requests and
//! their transitive dependencies, under a selection policy. When no
//! satisfying subset exists, it produces a structured explanation tracing
//! blame through the dependency graph.
//!
//! # Architecture
//!
//! - Problem builder: candidates + policy → integer linear program
//! - ILP oracle: minimize the objective subject to the constraints
//! - Blame tracer: replay violated constraints into a failure report
//!
//! Resolution itself, downloading, building and installing are external
//! collaborators; this crate consumes an immutable candidate table and
//! produces a solution table or a failure report.

pub mod candidate;
mod error;
pub mod solver;
pub mod version;

pub use candidate::{
    base_packages, satisfies_remote, Candidate, CandidateSource, DepEdge, DepKind, Platform,
    RemoteSpec, RepoType, Resolution, ResolutionStatus,
};
pub use error::{Error, Result};
pub use solver::{
    BranchAndBound, BranchAndBoundOptions, Constraint, ConstraintKind, ConstraintOp, FailureKind,
    FailureReport, MilpOracle, Policy, Problem, RawSolution, SolutionResult, SolveFailure,
    SolveStatus, Solver, BINARY_MIRROR_MARKER, DUMMY_COST,
};
pub use version::{version_satisfies, PkgVersion, VersionOp, VersionReq};
