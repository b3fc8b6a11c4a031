//! Table selection by glob pattern.

use crate::config::ConfigError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Include/exclude globs over table names.
///
/// No include patterns selects every table. Exclude wins over include.
/// Matching ignores case, like the rest of the CLI's glob options.
#[derive(Debug, Clone)]
pub struct TableFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl Default for TableFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl TableFilter {
    /// Select every table.
    pub fn all() -> Self {
        Self {
            include: None,
            exclude: None,
        }
    }

    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    pub fn matches(&self, table: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |set| set.is_match(table));
        let excluded = self
            .exclude
            .as_ref()
            .map_or(false, |set| set.is_match(table));
        included && !excluded
    }

    /// Keep matching tables, preserving order.
    pub fn apply(&self, tables: Vec<String>) -> Vec<String> {
        tables.into_iter().filter(|t| self.matches(t)).collect()
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>, ConfigError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.trim())
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_selects_everything() {
        let filter = TableFilter::all();
        assert!(filter.matches("dim_customer"));
        assert!(filter.matches("anything"));
    }

    #[test]
    fn test_include_prefixes() {
        let filter = TableFilter::new(&strings(&["dim_*", "fact_*"]), &[]).unwrap();
        assert!(filter.matches("dim_customer"));
        assert!(filter.matches("fact_orders"));
        assert!(!filter.matches("staging_orders"));
    }

    #[test]
    fn test_exclude_wins() {
        let filter = TableFilter::new(&strings(&["fact_*"]), &strings(&["*_tmp"])).unwrap();
        assert!(filter.matches("fact_orders"));
        assert!(!filter.matches("fact_orders_tmp"));
    }

    #[test]
    fn test_case_insensitive() {
        let filter = TableFilter::new(&strings(&["DIM_*"]), &[]).unwrap();
        assert!(filter.matches("dim_region"));
    }

    #[test]
    fn test_apply_keeps_order() {
        let filter = TableFilter::new(&[], &strings(&["audit_log"])).unwrap();
        let kept = filter.apply(strings(&["b", "audit_log", "a"]));
        assert_eq!(kept, strings(&["b", "a"]));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = TableFilter::new(&strings(&["dim_{"]), &[]).unwrap_err();
        assert!(err.to_string().contains("dim_{"));
    }
}
