// tests/common/mod.rs

//! Shared candidate-table builders for integration tests.

use pkgsolve::{
    Candidate, CandidateSource, PkgVersion, Platform, Policy, RepoType, Solver, VersionReq,
};

pub fn ver(s: &str) -> PkgVersion {
    PkgVersion::parse(s).unwrap()
}

pub fn req(s: &str) -> VersionReq {
    VersionReq::parse(s).unwrap()
}

/// A cran source candidate with an explicit ref
pub fn cran(r: &str, name: &str, version: &str) -> Candidate {
    Candidate::new(r, name, CandidateSource::Cran).with_version(ver(version))
}

/// Turn a candidate into a binary build
pub fn binary(c: Candidate) -> Candidate {
    c.with_platform(Platform::Binary("x86_64-pc-linux-gnu".to_string()))
}

/// A candidate already present in the local library
pub fn installed(name: &str, version: &str, repotype: Option<RepoType>) -> Candidate {
    Candidate::new(
        format!("installed::/opt/lib/{}", name),
        name,
        CandidateSource::Installed { repotype },
    )
    .with_version(ver(version))
}

/// A solver with the test library configured
pub fn solver(policy: Policy) -> Solver {
    Solver::new(policy).library("/opt/lib")
}
