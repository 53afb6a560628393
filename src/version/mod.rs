// src/version/mod.rs

//! Version handling and requirement satisfaction for package dependencies
//!
//! Package versions are hierarchical dotted numeric versions with an
//! arbitrary number of components. Comparison is component-wise numeric,
//! left to right, with shorter versions padded with zeros, so `1.2` and
//! `1.2.0` compare equal.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed package version
///
/// Components are separated by `.` or `-` (both separators occur in the
/// wild) and must be non-negative integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PkgVersion {
    raw: String,
    components: Vec<u64>,
}

impl PkgVersion {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → [1, 2, 3]
    /// - "0.99-12" → [0, 99, 12]
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let mut components = Vec::new();
        for part in s.split(['.', '-']) {
            let n = part
                .parse::<u64>()
                .map_err(|_| Error::InvalidVersion(s.to_string()))?;
            components.push(n);
        }

        Ok(Self {
            raw: s.to_string(),
            components,
        })
    }

    /// The numeric components of this version
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Components with trailing zeros removed, the canonical form used
    /// for equality and hashing
    fn normalized(&self) -> &[u64] {
        let mut end = self.components.len();
        while end > 0 && self.components[end - 1] == 0 {
            end -= 1;
        }
        &self.components[..end]
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for PkgVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PkgVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PkgVersion> for String {
    fn from(v: PkgVersion) -> String {
        v.raw
    }
}

impl PartialEq for PkgVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PkgVersion {}

impl Hash for PkgVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl VersionOp {
    /// The operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for VersionOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "==" | "=" => Ok(Self::Eq),
            "!=" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::LtEq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::GtEq),
            _ => Err(Error::InvalidConstraint(s.to_string())),
        }
    }
}

/// A version requirement on a dependency edge
///
/// An absent requirement (the edge carries `None`) means any version is
/// acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReq {
    pub op: VersionOp,
    pub version: PkgVersion,
}

impl VersionReq {
    pub fn new(op: VersionOp, version: PkgVersion) -> Self {
        Self { op, version }
    }

    /// Parse a requirement string
    ///
    /// Examples:
    /// - ">= 2.0" → GtEq(2.0)
    /// - "< 1.5.3" → Lt(1.5.3)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::InvalidConstraint(s.to_string()))?;
        if split == 0 {
            return Err(Error::InvalidConstraint(s.to_string()));
        }

        let op = s[..split].trim().parse::<VersionOp>()?;
        let version = PkgVersion::parse(&s[split..])?;
        Ok(Self { op, version })
    }

    /// Check whether a version satisfies this requirement
    pub fn satisfies(&self, version: &PkgVersion) -> bool {
        version_satisfies(version, self.op, &self.version)
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

/// Apply a comparison operator between a candidate version and a required
/// version
pub fn version_satisfies(version: &PkgVersion, op: VersionOp, required: &PkgVersion) -> bool {
    match op {
        VersionOp::Eq => version == required,
        VersionOp::NotEq => version != required,
        VersionOp::Lt => version < required,
        VersionOp::LtEq => version <= required,
        VersionOp::Gt => version > required,
        VersionOp::GtEq => version >= required,
    }
}
