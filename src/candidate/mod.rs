// src/candidate/mod.rs

//! Candidate data model and resolver-contract predicates
//!
//! A candidate is one possible way to obtain one version of one package,
//! produced by the upstream resolver. The solver consumes an immutable
//! snapshot of the candidate table and never mutates it.

use crate::version::{PkgVersion, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Registry a locally installed candidate originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Cran,
    Bioc,
}

/// Where a candidate comes from
///
/// `Installed` means the package is already present in the local library;
/// `Standard` is an abstract request that any registry may satisfy; `Deps`
/// is a virtual meta-candidate that installs only dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandidateSource {
    Installed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repotype: Option<RepoType>,
    },
    Cran,
    Bioc,
    Standard,
    Github,
    Url,
    Local,
    Deps,
}

impl CandidateSource {
    /// The string tag for this source kind
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Installed { .. } => "installed",
            Self::Cran => "cran",
            Self::Bioc => "bioc",
            Self::Standard => "standard",
            Self::Github => "github",
            Self::Url => "url",
            Self::Local => "local",
            Self::Deps => "deps",
        }
    }

    /// Parse a source kind from a ref prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "installed" => Some(Self::Installed { repotype: None }),
            "cran" => Some(Self::Cran),
            "bioc" => Some(Self::Bioc),
            "standard" => Some(Self::Standard),
            "github" => Some(Self::Github),
            "url" => Some(Self::Url),
            "local" => Some(Self::Local),
            "deps" => Some(Self::Deps),
            _ => None,
        }
    }

    /// Whether this is a registry kind (cran, bioc or standard)
    pub fn is_registry(&self) -> bool {
        matches!(self, Self::Cran | Self::Bioc | Self::Standard)
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_str())
    }
}

/// Build platform of a candidate artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Source,
    Binary(String),
}

impl Platform {
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::Source
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Binary(tag) => write!(f, "{}", tag),
        }
    }
}

/// Outcome of upstream resolution for a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionStatus {
    Ok,
    Failed,
}

/// Kind of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
    Depends,
    Imports,
    LinkingTo,
    Suggests,
    Enhances,
}

impl DepKind {
    /// The dependency kinds honored for installation by default
    pub fn default_install_set() -> Vec<DepKind> {
        vec![Self::Depends, Self::Imports, Self::LinkingTo]
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Depends => "depends",
            Self::Imports => "imports",
            Self::LinkingTo => "linkingto",
            Self::Suggests => "suggests",
            Self::Enhances => "enhances",
        };
        write!(f, "{}", s)
    }
}

/// A dependency edge from a candidate to a package it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepEdge {
    /// Ref of the resolved dependency candidate
    #[serde(rename = "ref")]
    pub dep_ref: String,
    /// Package the dependency is on
    pub package: String,
    /// Dependency kind (depends, imports, ...)
    pub kind: DepKind,
    /// Version requirement, `None` when unconstrained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req: Option<VersionReq>,
}

impl DepEdge {
    pub fn new(dep_ref: impl Into<String>, package: impl Into<String>, kind: DepKind) -> Self {
        Self {
            dep_ref: dep_ref.into(),
            package: package.into(),
            kind,
            req: None,
        }
    }

    pub fn with_req(mut self, req: VersionReq) -> Self {
        self.req = Some(req);
        self
    }

    /// Human-readable form, e.g. `B (>= 2.0)`
    pub fn describe(&self) -> String {
        match &self.req {
            Some(req) => format!("{} ({})", self.dep_ref, req),
            None => self.dep_ref.clone(),
        }
    }
}

/// One concrete offer of one package version from one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable identifier, e.g. `cran::pkg` or `github::user/pkg@sha`
    #[serde(rename = "ref")]
    pub ref_: String,
    /// Package name; many candidates may share a package
    pub package: String,
    /// Semantic version; absent only when resolution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PkgVersion>,
    /// Source kind, serialized as the `type` field
    #[serde(flatten)]
    pub source: CandidateSource,
    /// Build platform of the artifact
    #[serde(default)]
    pub platform: Platform,
    /// Origin URL, used to detect alternate binary mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,
    /// True iff the user requested this package by name
    #[serde(default)]
    pub direct: bool,
    /// Resolution outcome
    pub status: ResolutionStatus,
    /// Ordered dependency edges
    #[serde(default)]
    pub deps: Vec<DepEdge>,
    /// Dependency kinds this candidate wishes to honor
    #[serde(default = "DepKind::default_install_set")]
    pub dep_types: Vec<DepKind>,
    /// Opaque resolver diagnostic when resolution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Candidate {
    pub fn new(
        ref_: impl Into<String>,
        package: impl Into<String>,
        source: CandidateSource,
    ) -> Self {
        Self {
            ref_: ref_.into(),
            package: package.into(),
            version: None,
            source,
            platform: Platform::Source,
            mirror: None,
            direct: false,
            status: ResolutionStatus::Ok,
            deps: Vec::new(),
            dep_types: DepKind::default_install_set(),
            error: None,
        }
    }

    pub fn with_version(mut self, version: PkgVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_mirror(mut self, mirror: impl Into<String>) -> Self {
        self.mirror = Some(mirror.into());
        self
    }

    pub fn with_deps(mut self, deps: Vec<DepEdge>) -> Self {
        self.deps = deps;
        self
    }

    pub fn with_dep_types(mut self, dep_types: Vec<DepKind>) -> Self {
        self.dep_types = dep_types;
        self
    }

    pub fn as_direct(mut self) -> Self {
        self.direct = true;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = ResolutionStatus::Failed;
        self.error = Some(error.into());
        self
    }

    pub fn is_installed(&self) -> bool {
        matches!(self.source, CandidateSource::Installed { .. })
    }

    pub fn is_binary(&self) -> bool {
        !self.platform.is_source()
    }
}

/// The request side of [`satisfies_remote`]
///
/// Derived from a direct candidate or parsed from a dependency ref string.
/// Ref syntax is `kind::rest` with a bare name meaning a standard request;
/// the package is the last path segment of the rest with any `@` qualifier
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub ref_: String,
    pub kind: CandidateSource,
    pub package: String,
}

impl RemoteSpec {
    /// Parse a ref string into a request
    pub fn parse(r: &str) -> Self {
        let (kind, rest) = match r.split_once("::") {
            Some((prefix, rest)) => (
                CandidateSource::from_prefix(prefix).unwrap_or(CandidateSource::Standard),
                rest,
            ),
            None => (CandidateSource::Standard, r),
        };

        let tail = rest.rsplit('/').next().unwrap_or(rest);
        let package = tail.split('@').next().unwrap_or(tail).to_string();

        Self {
            ref_: r.to_string(),
            kind,
            package,
        }
    }

    /// The request a candidate itself represents
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            ref_: candidate.ref_.clone(),
            kind: candidate.source.clone(),
            package: candidate.package.clone(),
        }
    }
}

/// Whether `candidate` is an acceptable substitute for the `wanted` request
///
/// Identical refs always satisfy. Otherwise the package names must match
/// and the wanted kind decides: a standard request accepts any registry or
/// installed candidate; a cran or bioc request accepts only its own
/// registry, or an installed candidate recorded as originating from it;
/// everything else is satisfied by its exact ref only.
pub fn satisfies_remote(wanted: &RemoteSpec, candidate: &Candidate) -> bool {
    if wanted.ref_ == candidate.ref_ {
        return true;
    }
    if wanted.package != candidate.package {
        return false;
    }

    match wanted.kind {
        CandidateSource::Standard => matches!(
            candidate.source,
            CandidateSource::Cran
                | CandidateSource::Bioc
                | CandidateSource::Standard
                | CandidateSource::Installed { .. }
        ),
        CandidateSource::Cran => matches!(
            candidate.source,
            CandidateSource::Cran
                | CandidateSource::Installed {
                    repotype: Some(RepoType::Cran),
                }
        ),
        CandidateSource::Bioc => matches!(
            candidate.source,
            CandidateSource::Bioc
                | CandidateSource::Installed {
                    repotype: Some(RepoType::Bioc),
                }
        ),
        CandidateSource::Installed { .. }
        | CandidateSource::Github
        | CandidateSource::Url
        | CandidateSource::Local
        | CandidateSource::Deps => false,
    }
}

/// Packages shipped with the language runtime, never installed by this
/// system and excluded from dependency constraints
pub fn base_packages() -> &'static [&'static str] {
    &[
        "base", "compiler", "datasets", "graphics", "grDevices", "grid", "methods", "parallel",
        "splines", "stats", "stats4", "tcltk", "tools", "utils",
    ]
}

/// An immutable snapshot of the candidate table
///
/// The snapshot carries a staleness flag: once the table is invalidated,
/// solving it is refused and the caller must re-resolve.
#[derive(Debug, Clone)]
pub struct Resolution {
    candidates: Vec<Candidate>,
    stale: bool,
}

impl Resolution {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            stale: false,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Mark the snapshot as invalidated
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// First candidate with the given ref, if any
    pub fn candidate_for_ref(&self, r: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.ref_ == r)
    }

    /// Candidate indices grouped by package, in first-appearance order
    pub fn package_groups(&self) -> Vec<(String, Vec<usize>)> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, c) in self.candidates.iter().enumerate() {
            if !groups.contains_key(&c.package) {
                order.push(c.package.clone());
            }
            groups.entry(c.package.clone()).or_default().push(i);
        }

        order
            .into_iter()
            .map(|pkg| {
                let idxs = groups.remove(&pkg).unwrap_or_default();
                (pkg, idxs)
            })
            .collect()
    }
}
