// src/solver/problem.rs

//! ILP problem construction
//!
//! Translates the candidate table plus a policy into an integer linear
//! program over binary variables: objective coefficients, cardinality
//! constraints, direct-ref satisfaction, static rule-outs and dependency
//! implications. Variables `0..N` are candidates, `N..N+D` are slack
//! variables, one per distinct direct package.

use crate::candidate::{
    base_packages, satisfies_remote, CandidateSource, DepKind, RemoteSpec, Resolution,
    ResolutionStatus,
};
use crate::version::PkgVersion;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

use super::Policy;

/// Objective cost of a slack variable
///
/// A slack is chosen only when no real candidate can satisfy its direct
/// request, so any objective at or above `DUMMY_COST - 1` signals an
/// infeasible install plan.
pub const DUMMY_COST: i64 = 1_000_000_000;

/// Mirror URL marker identifying an alternate binary source
///
/// Stopgap from the resolver contract; candidates served from such a
/// mirror count as binaries even when tagged as source builds.
pub const BINARY_MIRROR_MARKER: &str = "__linux__";

/// Comparison direction of a linear constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Le => "<=",
            Self::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Why a constraint exists, with the data the blame tracer replays later
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// A direct package selects exactly one candidate or its slack
    ExactlyOnce { package: String },
    /// An indirect package selects at most one candidate
    AtMostOnce { package: String },
    /// The constrained candidate cannot satisfy the direct request
    /// made by candidate `wanted`
    SatisfyRefs { wanted: usize },
    /// The candidate's upstream resolution failed
    OkResolution { candidate: usize },
    /// The constrained candidate duplicates an installed one
    PreferInstalled { installed: usize },
    /// The constrained candidate loses to a binary of the same version
    PreferBinary { preferred: usize },
    /// If `upstream` is selected, one of `good_cand` must be too
    Dependency {
        upstream: usize,
        dep_ref: String,
        cand: Vec<usize>,
        good_cand: Vec<usize>,
        message: String,
    },
}

impl ConstraintKind {
    /// The constraint type tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExactlyOnce { .. } => "exactly-once",
            Self::AtMostOnce { .. } => "at-most-once",
            Self::SatisfyRefs { .. } => "satisfy-refs",
            Self::OkResolution { .. } => "ok-resolution",
            Self::PreferInstalled { .. } => "prefer-installed",
            Self::PreferBinary { .. } => "prefer-binary",
            Self::Dependency { .. } => "dependency",
        }
    }
}

/// A linear constraint over binary variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub vars: Vec<usize>,
    pub coefs: Vec<i64>,
    pub op: ConstraintOp,
    pub rhs: i64,
    pub kind: ConstraintKind,
}

impl Constraint {
    /// A constraint forcing a single variable to zero
    fn rule_out(var: usize, kind: ConstraintKind) -> Self {
        Self {
            vars: vec![var],
            coefs: vec![1],
            op: ConstraintOp::Eq,
            rhs: 0,
            kind,
        }
    }
}

/// An integer linear program over the candidate table
///
/// Constructed once per solve call and byte-identical across runs for a
/// fixed input table, candidate order and policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Number of candidate variables
    pub num_candidates: usize,
    /// Number of slack variables (distinct direct packages)
    pub num_direct: usize,
    /// Objective coefficients for all `num_candidates + num_direct`
    /// variables, minimized
    pub obj: Vec<i64>,
    /// Constraints in emission order; the blame tracer scans by kind
    pub conds: Vec<Constraint>,
    /// Candidate indices statically known to be unusable
    pub ruled_out: BTreeSet<usize>,
    refs: Vec<String>,
    direct_packages: Vec<String>,
}

impl Problem {
    /// Build the ILP problem for a candidate table under a policy
    pub fn build(resolution: &Resolution, policy: Policy) -> Problem {
        ProblemBuilder::new(resolution, policy).build()
    }

    /// Total number of binary variables
    pub fn total(&self) -> usize {
        self.num_candidates + self.num_direct
    }

    /// Candidate refs, by variable index
    pub fn refs(&self) -> &[String] {
        &self.refs
    }

    /// Distinct direct package names; slack variable `num_candidates + k`
    /// belongs to the `k`-th entry
    pub fn direct_packages(&self) -> &[String] {
        &self.direct_packages
    }

    /// Render one constraint as a human-readable line
    pub fn render_constraint(&self, constraint: &Constraint) -> String {
        match &constraint.kind {
            ConstraintKind::ExactlyOnce { package } => {
                format!("Install exactly one candidate for {}", package)
            }
            ConstraintKind::AtMostOnce { package } => {
                format!("Install at most one candidate for {}", package)
            }
            ConstraintKind::SatisfyRefs { wanted } => format!(
                "{} does not satisfy requested {}",
                self.refs[constraint.vars[0]], self.refs[*wanted]
            ),
            ConstraintKind::OkResolution { candidate } => {
                format!("{} failed to resolve", self.refs[*candidate])
            }
            ConstraintKind::PreferInstalled { installed } => format!(
                "{} is superseded by installed {}",
                self.refs[constraint.vars[0]], self.refs[*installed]
            ),
            ConstraintKind::PreferBinary { preferred } => format!(
                "{} is superseded by binary {}",
                self.refs[constraint.vars[0]], self.refs[*preferred]
            ),
            ConstraintKind::Dependency {
                upstream, dep_ref, ..
            } => format!("{} requires {}", self.refs[*upstream], dep_ref),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.refs {
            writeln!(f, "{}", r)?;
        }
        for c in &self.conds {
            writeln!(f, "{}", self.render_constraint(c))?;
        }
        Ok(())
    }
}

/// Accumulates the problem across the seven builder phases; the finished
/// [`Problem`] is exposed only after all phases ran
struct ProblemBuilder<'a> {
    resolution: &'a Resolution,
    policy: Policy,
    groups: Vec<(String, Vec<usize>)>,
    direct_packages: Vec<String>,
    obj: Vec<i64>,
    conds: Vec<Constraint>,
    ruled_out: BTreeSet<usize>,
}

impl<'a> ProblemBuilder<'a> {
    fn new(resolution: &'a Resolution, policy: Policy) -> Self {
        let groups = resolution.package_groups();
        let candidates = resolution.candidates();
        let direct_packages = groups
            .iter()
            .filter(|(_, idxs)| idxs.iter().any(|&i| candidates[i].direct))
            .map(|(pkg, _)| pkg.clone())
            .collect();

        Self {
            resolution,
            policy,
            groups,
            direct_packages,
            obj: Vec::new(),
            conds: Vec::new(),
            ruled_out: BTreeSet::new(),
        }
    }

    fn build(mut self) -> Problem {
        self.objective();
        self.cardinality();
        self.satisfy_refs();
        self.resolution_failures();
        self.prefer_installed();
        self.prefer_binaries();
        self.dependencies();

        let num_candidates = self.resolution.len();
        let num_direct = self.direct_packages.len();
        debug!(
            "built ILP problem: {} candidates, {} slack variables, {} constraints",
            num_candidates,
            num_direct,
            self.conds.len()
        );

        Problem {
            num_candidates,
            num_direct,
            obj: self.obj,
            conds: self.conds,
            ruled_out: self.ruled_out,
            refs: self
                .resolution
                .candidates()
                .iter()
                .map(|c| c.ref_.clone())
                .collect(),
            direct_packages: self.direct_packages,
        }
    }

    /// Phase 1: objective coefficients per policy, then one `DUMMY_COST`
    /// slot per slack variable
    fn objective(&mut self) {
        self.obj = match self.policy {
            Policy::Lazy => self.lazy_objective(),
            Policy::Upgrade => self.upgrade_objective(),
        };
        for _ in 0..self.direct_packages.len() {
            self.obj.push(DUMMY_COST);
        }
    }

    /// Lazy policy: keep what is installed, prefer binaries over source
    fn lazy_objective(&self) -> Vec<i64> {
        self.resolution
            .candidates()
            .iter()
            .map(|c| {
                if c.is_installed() {
                    0
                } else if c.platform.is_source() {
                    5
                } else {
                    1
                }
            })
            .collect()
    }

    /// Upgrade policy: newer versions cost less within each package
    ///
    /// Versions are ranked per package with competition ranking (ties
    /// share the minimum rank, rank 1 is the oldest), normalized so the
    /// newest candidates cost 0, then nudged by a type tiebreaker and
    /// shifted so the global minimum is 0.
    fn upgrade_objective(&self) -> Vec<i64> {
        let candidates = self.resolution.candidates();
        let n = candidates.len();
        let mut obj = vec![(n as i64 + 1) * 100; n];

        for (_, idxs) in &self.groups {
            let ranked: Vec<(usize, &PkgVersion)> = idxs
                .iter()
                .copied()
                .filter_map(|i| {
                    let c = &candidates[i];
                    if c.status == ResolutionStatus::Ok {
                        c.version.as_ref().map(|v| (i, v))
                    } else {
                        None
                    }
                })
                .collect();
            if ranked.is_empty() {
                continue;
            }

            let ranks: Vec<i64> = ranked
                .iter()
                .map(|&(_, v)| 1 + ranked.iter().filter(|&&(_, o)| o < v).count() as i64)
                .collect();
            let max_rank = ranks.iter().copied().max().unwrap_or(1);

            for (k, &(i, _)) in ranked.iter().enumerate() {
                obj[i] = (max_rank - ranks[k] + 1) * 100;
            }
            let pkg_min = ranked.iter().map(|&(i, _)| obj[i]).min().unwrap_or(0);
            for &(i, _) in &ranked {
                obj[i] -= pkg_min;
            }
        }

        for (i, c) in candidates.iter().enumerate() {
            obj[i] += if c.is_installed() {
                1
            } else if c.platform.is_source() {
                3
            } else {
                2
            };
        }

        if let Some(global_min) = obj.iter().copied().min() {
            for o in obj.iter_mut() {
                *o -= global_min;
            }
        }

        obj
    }

    /// Phase 2: exactly-once per direct package (candidates plus slack),
    /// at-most-once per indirect package
    fn cardinality(&mut self) {
        let candidates = self.resolution.candidates();
        let n = candidates.len();

        for (pkg, idxs) in &self.groups {
            let direct_pos = self.direct_packages.iter().position(|p| p == pkg);
            match direct_pos {
                Some(k) => {
                    let mut vars = idxs.clone();
                    vars.push(n + k);
                    let coefs = vec![1; vars.len()];
                    self.conds.push(Constraint {
                        vars,
                        coefs,
                        op: ConstraintOp::Eq,
                        rhs: 1,
                        kind: ConstraintKind::ExactlyOnce {
                            package: pkg.clone(),
                        },
                    });
                }
                None => {
                    self.conds.push(Constraint {
                        vars: idxs.clone(),
                        coefs: vec![1; idxs.len()],
                        op: ConstraintOp::Le,
                        rhs: 1,
                        kind: ConstraintKind::AtMostOnce {
                            package: pkg.clone(),
                        },
                    });
                }
            }
        }
    }

    /// Phase 3: candidates that cannot satisfy a direct request are
    /// forced to zero
    fn satisfy_refs(&mut self) {
        let candidates = self.resolution.candidates();
        let group_of: HashMap<&str, &Vec<usize>> = self
            .groups
            .iter()
            .map(|(pkg, idxs)| (pkg.as_str(), idxs))
            .collect();

        for (c_idx, c) in candidates.iter().enumerate() {
            if !c.direct {
                continue;
            }
            let wanted = RemoteSpec::from_candidate(c);
            let Some(idxs) = group_of.get(c.package.as_str()) else {
                continue;
            };
            for &o in idxs.iter() {
                if o == c_idx {
                    continue;
                }
                if !satisfies_remote(&wanted, &candidates[o]) {
                    self.conds.push(Constraint::rule_out(
                        o,
                        ConstraintKind::SatisfyRefs { wanted: c_idx },
                    ));
                }
            }
        }
    }

    /// Phase 4: failed resolutions are forced to zero and ruled out
    fn resolution_failures(&mut self) {
        for (i, c) in self.resolution.candidates().iter().enumerate() {
            if c.status == ResolutionStatus::Failed {
                self.conds.push(Constraint::rule_out(
                    i,
                    ConstraintKind::OkResolution { candidate: i },
                ));
                self.ruled_out.insert(i);
            }
        }
    }

    /// Phase 5: registry candidates duplicating an installed package at
    /// the same version are ruled out
    fn prefer_installed(&mut self) {
        let candidates = self.resolution.candidates();
        let group_of: HashMap<&str, &Vec<usize>> = self
            .groups
            .iter()
            .map(|(pkg, idxs)| (pkg.as_str(), idxs))
            .collect();

        for (i, c) in candidates.iter().enumerate() {
            let CandidateSource::Installed { repotype: Some(_) } = c.source
            else {
                continue;
            };
            let Some(installed_version) = &c.version else {
                continue;
            };
            let Some(idxs) = group_of.get(c.package.as_str()) else {
                continue;
            };
            for &o in idxs.iter() {
                if o == i {
                    continue;
                }
                let other = &candidates[o];
                if other.source.is_registry() && other.version.as_ref() == Some(installed_version)
                {
                    self.conds.push(Constraint::rule_out(
                        o,
                        ConstraintKind::PreferInstalled { installed: i },
                    ));
                    self.ruled_out.insert(o);
                }
            }
        }
    }

    /// Phase 6: among same-version registry candidates, prefer a binary
    /// (or a build served from a binary mirror) over the rest
    fn prefer_binaries(&mut self) {
        let candidates = self.resolution.candidates();

        type PartitionKey = (&'static str, String, Option<PkgVersion>);
        let mut order: Vec<PartitionKey> = Vec::new();
        let mut partitions: HashMap<PartitionKey, Vec<usize>> = HashMap::new();

        for (i, c) in candidates.iter().enumerate() {
            if !c.source.is_registry() {
                continue;
            }
            let key = (c.source.kind_str(), c.package.clone(), c.version.clone());
            if !partitions.contains_key(&key) {
                order.push(key.clone());
            }
            partitions.entry(key).or_default().push(i);
        }

        for key in order {
            let members = &partitions[&key];
            let preferred = members
                .iter()
                .copied()
                .find(|&i| candidates[i].is_binary())
                .or_else(|| {
                    members.iter().copied().find(|&i| {
                        candidates[i]
                            .mirror
                            .as_deref()
                            .is_some_and(|m| m.contains(BINARY_MIRROR_MARKER))
                    })
                });
            let Some(preferred) = preferred else {
                continue;
            };
            for &o in members.iter() {
                if o == preferred {
                    continue;
                }
                self.conds.push(Constraint::rule_out(
                    o,
                    ConstraintKind::PreferBinary { preferred },
                ));
                self.ruled_out.insert(o);
            }
        }
    }

    /// Phase 7: dependency implications
    ///
    /// For each usable candidate and each honored dependency edge, selecting
    /// the candidate forces selecting one of the dependency's good
    /// candidates: `x_c - sum(good) <= 0`.
    fn dependencies(&mut self) {
        let candidates = self.resolution.candidates();
        let group_of: HashMap<&str, &Vec<usize>> = self
            .groups
            .iter()
            .map(|(pkg, idxs)| (pkg.as_str(), idxs))
            .collect();

        for (c_idx, c) in candidates.iter().enumerate() {
            if c.status != ResolutionStatus::Ok
                || self.ruled_out.contains(&c_idx)
            {
                continue;
            }

            for edge in &c.deps {
                // language-runtime pseudo-dependency
                if edge.dep_ref == "R" || edge.package == "R" {
                    continue;
                }
                if base_packages().contains(&edge.package.as_str()) {
                    continue;
                }
                if !c.dep_types.contains(&edge.kind) {
                    continue;
                }
                // binaries are pre-linked
                if c.is_binary() && edge.kind == DepKind::LinkingTo {
                    continue;
                }

                let cand: Vec<usize> = group_of
                    .get(edge.package.as_str())
                    .map(|idxs| (*idxs).clone())
                    .unwrap_or_default();

                let wanted = self
                    .resolution
                    .candidate_for_ref(&edge.dep_ref)
                    .map(RemoteSpec::from_candidate)
                    .unwrap_or_else(|| RemoteSpec::parse(&edge.dep_ref));

                let good_cand: Vec<usize> = cand
                    .iter()
                    .copied()
                    .filter(|&j| {
                        let dep = &candidates[j];
                        if dep.status != ResolutionStatus::Ok {
                            return false;
                        }
                        if !satisfies_remote(&wanted, dep) {
                            return false;
                        }
                        match &edge.req {
                            None => true,
                            Some(req) => {
                                dep.version.as_ref().is_some_and(|v| req.satisfies(v))
                            }
                        }
                    })
                    .collect();

                let mut vars = vec![c_idx];
                vars.extend(good_cand.iter().copied());
                let mut coefs = vec![1i64];
                coefs.extend(std::iter::repeat(-1).take(good_cand.len()));

                self.conds.push(Constraint {
                    vars,
                    coefs,
                    op: ConstraintOp::Le,
                    rhs: 0,
                    kind: ConstraintKind::Dependency {
                        upstream: c_idx,
                        dep_ref: edge.dep_ref.clone(),
                        cand,
                        good_cand,
                        message: format!("Cannot install dependency {}", edge.describe()),
                    },
                });
            }
        }
    }
}
