//! SQL-dialect abstraction: the core's queries are
//! built through a small trait rather than hand-written per backend, so a
//! non-Postgres store only needs a new `SqlDialect` impl, not new
//! repository logic.

/// Builds backend-specific SQL fragments for the handful of constructs
/// that differ across dialects: "first row of an ordered query" and
/// `IN (...)` array membership.
pub trait SqlDialect: Send + Sync {
 /// Wraps `base_query` (already ordered) to return only its first row.
 fn build_select_first_sql(&self, base_query: &str) -> String;

 /// Whether this dialect supports passing a Rust slice as a single bound
 /// `= ANY($n)` / `IN (...)` parameter.
 fn supports_in_array(&self) -> bool;

 /// Rewrites a query written against the canonical (Postgres) dialect
 /// into this dialect's syntax. Postgres is the identity case.
 fn translate(&self, query: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
 fn build_select_first_sql(&self, base_query: &str) -> String {
 format!("{base_query} LIMIT 1")
 }

 fn supports_in_array(&self) -> bool {
 true
 }

 fn translate(&self, query: &str) -> String {
 query.to_string()
 }
}
