//! Scope resolution.
//!
//! A caller passes an optional scope string. Absent or blank means the global
//! bucket, [`WILDCARD_SCOPE`] means every scope (reads only), anything else is
//! an exact, case-sensitive project name.

use crate::error::{MemoryError, MemoryResult};

/// Name of the default bucket.
pub const GLOBAL_SCOPE: &str = "global";

/// Read-only sentinel selecting all scopes.
pub const WILDCARD_SCOPE: &str = "*";

/// Which rows a read should consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    All,
    Exact(String),
}

impl ScopeFilter {
    pub fn resolve(scope: Option<&str>) -> Self {
        match scope.map(str::trim) {
            None | Some("") => Self::Exact(GLOBAL_SCOPE.to_string()),
            Some(WILDCARD_SCOPE) => Self::All,
            Some(name) => Self::Exact(name.to_string()),
        }
    }
}

impl std::fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(WILDCARD_SCOPE),
            Self::Exact(name) => f.write_str(name),
        }
    }
}

/// Canonical scope for a write. The wildcard is rejected.
pub fn resolve_write_scope(scope: Option<&str>) -> MemoryResult<String> {
    match ScopeFilter::resolve(scope) {
        ScopeFilter::All => Err(MemoryError::InvalidArgument(
            "the wildcard scope '*' cannot be written to".into(),
        )),
        ScopeFilter::Exact(name) => Ok(name),
    }
}

/// A project name usable as a rename source or target: not blank, not the
/// wildcard, not the global bucket.
pub fn validate_project_name(name: &str) -> MemoryResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MemoryError::InvalidArgument("project name must not be empty".into()));
    }
    if name == WILDCARD_SCOPE || name == GLOBAL_SCOPE {
        return Err(MemoryError::InvalidArgument(format!(
            "'{name}' is reserved and cannot be renamed"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_is_global() {
        assert_eq!(ScopeFilter::resolve(None), ScopeFilter::Exact("global".into()));
        assert_eq!(ScopeFilter::resolve(Some("")), ScopeFilter::Exact("global".into()));
        assert_eq!(ScopeFilter::resolve(Some("  ")), ScopeFilter::Exact("global".into()));
    }

    #[test]
    fn wildcard_selects_all() {
        let filter = ScopeFilter::resolve(Some("*"));
        assert_eq!(filter, ScopeFilter::All);
        assert_eq!(filter.to_string(), "*");
    }

    #[test]
    fn project_names_are_case_sensitive() {
        let filter = ScopeFilter::resolve(Some(" App "));
        assert_eq!(filter, ScopeFilter::Exact("App".into()));
        assert_ne!(filter, ScopeFilter::resolve(Some("app")));
    }

    #[test]
    fn wildcard_is_not_a_write_target() {
        let err = resolve_write_scope(Some("*")).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
        assert_eq!(resolve_write_scope(None).unwrap(), "global");
        assert_eq!(resolve_write_scope(Some("app")).unwrap(), "app");
    }

    #[test]
    fn reserved_names_cannot_be_renamed() {
        assert!(validate_project_name("global").is_err());
        assert!(validate_project_name("*").is_err());
        assert!(validate_project_name(" ").is_err());
        assert_eq!(validate_project_name(" web ").unwrap(), "web");
    }
}
