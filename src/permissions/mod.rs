//! Permissions Module - GitHub token scopes and least-privilege derivation
//!
//! - `Permissions`: ordered `Scope → Level` map with an optional shorthand
//! - `solver`: fold safe-output bundles and apply the `id-token` rule
//!
//! Levels are ordered `none < read < write < admin`; merging keeps the
//! maximum per scope.

mod solver;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::error::{AwError, Result};

pub use solver::{solve_safe_outputs, uses_oidc_action, OIDC_ACTIONS};

/// Access level of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    None,
    Read,
    Write,
    Admin,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Read => "read",
            Level::Write => "write",
            Level::Admin => "admin",
        }
    }
}

impl FromStr for Level {
    type Err = AwError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Level::None),
            "read" => Ok(Level::Read),
            "write" => Ok(Level::Write),
            "admin" => Ok(Level::Admin),
            other => Err(AwError::schema(
                "permissions",
                format!("unknown level '{}' (expected none, read, write or admin)", other),
            )),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GitHub token scope. Variant order is the emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Actions,
    Attestations,
    Checks,
    Contents,
    Deployments,
    Discussions,
    IdToken,
    Issues,
    Metadata,
    Models,
    Packages,
    Pages,
    PullRequests,
    RepositoryProjects,
    SecurityEvents,
    Statuses,
}

impl Scope {
    pub const ALL: [Scope; 16] = [
        Scope::Actions,
        Scope::Attestations,
        Scope::Checks,
        Scope::Contents,
        Scope::Deployments,
        Scope::Discussions,
        Scope::IdToken,
        Scope::Issues,
        Scope::Metadata,
        Scope::Models,
        Scope::Packages,
        Scope::Pages,
        Scope::PullRequests,
        Scope::RepositoryProjects,
        Scope::SecurityEvents,
        Scope::Statuses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Actions => "actions",
            Scope::Attestations => "attestations",
            Scope::Checks => "checks",
            Scope::Contents => "contents",
            Scope::Deployments => "deployments",
            Scope::Discussions => "discussions",
            Scope::IdToken => "id-token",
            Scope::Issues => "issues",
            Scope::Metadata => "metadata",
            Scope::Models => "models",
            Scope::Packages => "packages",
            Scope::Pages => "pages",
            Scope::PullRequests => "pull-requests",
            Scope::RepositoryProjects => "repository-projects",
            Scope::SecurityEvents => "security-events",
            Scope::Statuses => "statuses",
        }
    }

    /// Scopes covered by `read-all` / `write-all`
    fn in_shorthand(&self) -> bool {
        !matches!(self, Scope::IdToken)
    }
}

impl FromStr for Scope {
    type Err = AwError;

    fn from_str(s: &str) -> Result<Self> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| AwError::schema(format!("permissions.{}", s), "unknown permission scope"))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    /// `read-all` → `Some(Read)`, `write-all` → `Some(Write)`
    shorthand: Option<Level>,
    scopes: BTreeMap<Scope, Level>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(scope, level)` pairs
    pub fn from_pairs(pairs: &[(Scope, Level)]) -> Self {
        let mut perms = Self::new();
        for (scope, level) in pairs {
            perms.grant(*scope, *level);
        }
        perms
    }

    /// `read-all` / `write-all`
    pub fn shorthand(level: Level) -> Self {
        Self {
            shorthand: Some(level),
            scopes: BTreeMap::new(),
        }
    }

    /// Parse the front-matter `permissions:` value
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::String(s) => match s.as_str() {
                "read-all" => Ok(Self::shorthand(Level::Read)),
                "write-all" => Ok(Self::shorthand(Level::Write)),
                other => Err(AwError::schema(
                    "permissions",
                    format!("unknown shorthand '{}' (expected read-all or write-all)", other),
                )),
            },
            Value::Mapping(map) => Self::from_mapping(map),
            _ => Err(AwError::schema(
                "permissions",
                "expected a mapping or 'read-all' / 'write-all'",
            )),
        }
    }

    pub fn from_mapping(map: &Mapping) -> Result<Self> {
        let mut perms = Self::new();
        for (k, v) in map {
            let key = k
                .as_str()
                .ok_or_else(|| AwError::schema("permissions", "scope names must be strings"))?;
            let scope: Scope = key.parse()?;
            let level_str = v.as_str().ok_or_else(|| {
                AwError::schema(format!("permissions.{}", key), "level must be a string")
            })?;
            let level: Level = level_str
                .parse()
                .map_err(|_| AwError::schema(format!("permissions.{}", key), format!("unknown level '{}'", level_str)))?;
            perms.scopes.insert(scope, level);
        }
        Ok(perms)
    }

    /// Raise `scope` to at least `level`
    pub fn grant(&mut self, scope: Scope, level: Level) {
        let entry = self.scopes.entry(scope).or_insert(level);
        if level > *entry {
            *entry = level;
        }
    }

    /// Record an explicit level, overriding any previous one
    pub fn set(&mut self, scope: Scope, level: Level) {
        self.scopes.insert(scope, level);
    }

    pub fn remove(&mut self, scope: Scope) {
        self.scopes.remove(&scope);
    }

    /// Effective level of a scope (explicit entry or shorthand)
    pub fn level(&self, scope: Scope) -> Option<Level> {
        let explicit = self.scopes.get(&scope).copied();
        let implied = self.shorthand.filter(|_| scope.in_shorthand());
        match (explicit, implied) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// True when `scope` is granted at least `level`
    pub fn allows(&self, scope: Scope, level: Level) -> bool {
        self.level(scope).is_some_and(|l| l >= level)
    }

    /// Per-scope maximum of both sets
    pub fn merge(&mut self, other: &Permissions) {
        self.shorthand = match (self.shorthand, other.shorthand) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for (scope, level) in &other.scopes {
            self.grant(*scope, *level);
        }
    }

    /// Builder form of [`merge`](Self::merge)
    pub fn merged(mut self, other: &Permissions) -> Self {
        self.merge(other);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.shorthand.is_none() && self.scopes.is_empty()
    }

    pub fn shorthand_level(&self) -> Option<Level> {
        self.shorthand
    }

    /// Explicit entries in emission order
    pub fn iter(&self) -> impl Iterator<Item = (Scope, Level)> + '_ {
        self.scopes.iter().map(|(s, l)| (*s, *l))
    }

    /// Scopes granted `write` or more (shorthand included)
    pub fn write_scopes(&self) -> Vec<Scope> {
        Scope::ALL
            .iter()
            .copied()
            .filter(|s| self.allows(*s, Level::Write))
            .collect()
    }

    /// Keep only the given scopes
    pub fn restricted_to(&self, keep: &[Scope]) -> Permissions {
        let mut out = Permissions::new();
        for scope in keep {
            if let Some(level) = self.level(*scope) {
                out.set(*scope, level);
            }
        }
        out
    }

    /// YAML form: the shorthand string when nothing exceeds it, otherwise an
    /// explicit mapping.
    pub fn to_yaml(&self) -> Value {
        if let Some(short) = self.shorthand {
            let exceeds = self
                .scopes
                .iter()
                .any(|(scope, level)| !scope.in_shorthand() || *level > short);
            if !exceeds && matches!(short, Level::Read | Level::Write) {
                let s = if short == Level::Read { "read-all" } else { "write-all" };
                return Value::String(s.to_string());
            }
            let mut map = Mapping::new();
            for scope in Scope::ALL {
                if let Some(level) = self.level(scope) {
                    map.insert(scope.as_str().into(), level.as_str().into());
                }
            }
            return Value::Mapping(map);
        }

        let mut map = Mapping::new();
        for (scope, level) in &self.scopes {
            map.insert(scope.as_str().into(), level.as_str().into());
        }
        Value::Mapping(map)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(short) = self.shorthand {
            write!(f, "{}-all", short)?;
            if self.scopes.is_empty() {
                return Ok(());
            }
            f.write_str(", ")?;
        }
        let parts: Vec<String> = self
            .scopes
            .iter()
            .map(|(s, l)| format!("{}: {}", s, l))
            .collect();
        f.write_str(&parts.join(", "))
    }
}
