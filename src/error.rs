// src/error.rs

//! Error types for the solver core

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a solve without a partial result
///
/// Infeasibility is not represented here: an infeasible problem is
/// recovered into a structured failure report on the solution result.
#[derive(Error, Debug)]
pub enum Error {
    /// Solve was invoked without a configured target library
    #[error("Cannot solve package plan without a configured package library")]
    NoLibrary,

    /// The candidate table has been invalidated since resolution
    #[error("Resolution is stale, re-resolve before solving")]
    StaleResolution,

    /// Policy string is neither `lazy` nor `upgrade`
    #[error("Unknown solve policy '{0}', expected 'lazy' or 'upgrade'")]
    UnknownPolicy(String),

    /// The ILP oracle returned a non-zero status
    #[error("ILP solver failed with status {status}")]
    OracleFailed { status: i32 },

    /// A version string could not be parsed
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    /// A version requirement string could not be parsed
    #[error("Invalid version requirement '{0}'")]
    InvalidConstraint(String),
}
