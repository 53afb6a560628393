// src/solver/oracle.rs

//! ILP oracle interface and the default minimizer
//!
//! The oracle is a pure function behind a trait: given the problem it
//! returns a status, the objective value and a 0/1 assignment for every
//! variable. Anything beyond minimizing the objective subject to the
//! constraints (heuristics, warm starts, bounding tricks) is outside the
//! contract, and tests are free to mock the trait.

use crate::error::Result;
use tracing::debug;

use super::problem::{Constraint, ConstraintOp, Problem};

/// Raw output of an oracle invocation
///
/// `status` 0 means an optimum was found; any other value is a
/// solver-internal failure the caller reports as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSolution {
    pub status: i32,
    pub objective: i64,
    pub assignment: Vec<bool>,
}

impl RawSolution {
    /// The trivial solution of a problem with no variables
    pub fn empty() -> Self {
        Self {
            status: 0,
            objective: 0,
            assignment: Vec::new(),
        }
    }
}

/// A mixed-integer linear minimizer for 0/1 problems
pub trait MilpOracle {
    /// Minimize the problem's objective subject to its constraints
    fn solve(&self, problem: &Problem) -> Result<RawSolution>;

    /// Oracle name for logging and diagnostics
    fn name(&self) -> &str;
}

/// Options for the default branch-and-bound oracle
#[derive(Debug, Clone)]
pub struct BranchAndBoundOptions {
    /// Maximum number of search nodes before giving up
    pub max_nodes: usize,
}

impl Default for BranchAndBoundOptions {
    fn default() -> Self {
        Self {
            max_nodes: 10_000_000,
        }
    }
}

/// Exact depth-first branch-and-bound over the binary variables
///
/// Variables are branched in index order, value 1 first, and an incumbent
/// is replaced only by a strictly cheaper one, so for a fixed problem the
/// returned assignment is deterministic. Callers must still not rely on
/// which of several tied optima is returned.
#[derive(Debug, Default)]
pub struct BranchAndBound {
    options: BranchAndBoundOptions,
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BranchAndBoundOptions) -> Self {
        Self { options }
    }
}

impl MilpOracle for BranchAndBound {
    fn solve(&self, problem: &Problem) -> Result<RawSolution> {
        let total = problem.total();
        if total == 0 {
            return Ok(RawSolution::empty());
        }

        let mut search = Search {
            problem,
            max_nodes: self.options.max_nodes,
            nodes: 0,
            assignment: vec![false; total],
            best_cost: i64::MAX,
            best: None,
        };
        let exhausted = search.dfs(0, 0);

        debug!(
            "branch-and-bound explored {} nodes (budget {})",
            search.nodes, search.max_nodes
        );

        match search.best {
            Some(assignment) if !exhausted => Ok(RawSolution {
                status: 0,
                objective: search.best_cost,
                assignment,
            }),
            // node budget exhausted or no feasible assignment: report a
            // solver-internal failure status
            _ => Ok(RawSolution {
                status: 1,
                objective: 0,
                assignment: vec![false; total],
            }),
        }
    }

    fn name(&self) -> &str {
        "branch-and-bound"
    }
}

/// Depth-first search state for one oracle invocation
struct Search<'a> {
    problem: &'a Problem,
    max_nodes: usize,
    nodes: usize,
    assignment: Vec<bool>,
    best_cost: i64,
    best: Option<Vec<bool>>,
}

impl Search<'_> {
    /// Explore assignments for variables `depth..`; returns true when the
    /// node budget ran out
    fn dfs(&mut self, depth: usize, cost: i64) -> bool {
        if self.nodes >= self.max_nodes {
            return true;
        }
        self.nodes += 1;

        if cost >= self.best_cost {
            return false;
        }
        if !self.feasible(depth) {
            return false;
        }
        if depth == self.problem.total() {
            self.best_cost = cost;
            self.best = Some(self.assignment.clone());
            return false;
        }

        self.assignment[depth] = true;
        if self.dfs(depth + 1, cost + self.problem.obj[depth]) {
            return true;
        }
        self.assignment[depth] = false;
        self.dfs(depth + 1, cost)
    }

    /// Check that every constraint can still be satisfied given the
    /// variables fixed below `depth`
    fn feasible(&self, depth: usize) -> bool {
        self.problem
            .conds
            .iter()
            .all(|c| self.constraint_open(c, depth))
    }

    fn constraint_open(&self, constraint: &Constraint, depth: usize) -> bool {
        let mut min_sum = 0i64;
        let mut max_sum = 0i64;

        for (&var, &coef) in constraint.vars.iter().zip(&constraint.coefs) {
            if var < depth {
                let fixed = if self.assignment[var] { coef } else { 0 };
                min_sum += fixed;
                max_sum += fixed;
            } else {
                min_sum += coef.min(0);
                max_sum += coef.max(0);
            }
        }

        match constraint.op {
            ConstraintOp::Eq => min_sum <= constraint.rhs && constraint.rhs <= max_sum,
            ConstraintOp::Le => min_sum <= constraint.rhs,
            ConstraintOp::Ge => max_sum >= constraint.rhs,
        }
    }
}
