//! SQL text helpers.
//!
//! Every identifier and literal that ends up in generated SQL goes through
//! these functions; nothing is interpolated raw.

use std::fmt;

/// Quote an identifier for DuckDB / PostgreSQL (`"name"`, embedded quotes doubled).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal (`'value'`, embedded quotes doubled).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A fully qualified `catalog.schema.table` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl Relation {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Dotted name without quoting, for log and console output.
    pub fn display_name(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            quote_ident(&self.catalog),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }
}

/// Query that lists the base tables (not views) of `schema`, executed on the
/// PostgreSQL side through `postgres_query`.
///
/// DuckDB's own `information_schema` reports every attached relation as
/// `BASE TABLE`, so the filter has to run remotely.
pub fn base_tables_query(alias: &str, schema: &str) -> String {
    let inner = format!(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = {} AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
        quote_literal(schema)
    );
    format!(
        "SELECT table_name FROM postgres_query({}, {}) ORDER BY table_name",
        quote_literal(alias),
        quote_literal(&inner)
    )
}

/// Mask every `password=...` value in `text`.
///
/// Works on a bare libpq keyword/value string and on engine error messages
/// that echo one back (the postgres scanner quotes the full dsn on connect
/// failures).
pub fn redact_conninfo(text: &str) -> String {
    const KEY: &str = "password=";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(KEY) {
        let value = &rest[start + KEY.len()..];
        out.push_str(&rest[..start]);
        out.push_str("password=***");
        rest = &value[password_len(value)..];
    }
    out.push_str(rest);
    out
}

/// Byte length of a libpq value: single-quoted with `\` escapes, or up to
/// the next whitespace (or a quote closing an enclosing literal).
fn password_len(value: &str) -> usize {
    if let Some(quoted) = value.strip_prefix('\'') {
        let mut escaped = false;
        for (idx, ch) in quoted.char_indices() {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '\'' => return idx + 2,
                _ => {}
            }
        }
        return value.len();
    }
    value
        .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .unwrap_or(value.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("Order Items"), "\"Order Items\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("public"), "'public'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_relation_display() {
        let rel = Relation::new("sales", "public", "dim_customer");
        assert_eq!(rel.to_string(), "\"sales\".\"public\".\"dim_customer\"");
        assert_eq!(rel.display_name(), "sales.public.dim_customer");
    }

    #[test]
    fn test_base_tables_query_nests_literals() {
        let sql = base_tables_query("sales", "public");
        assert_eq!(
            sql,
            "SELECT table_name FROM postgres_query('sales', \
             'SELECT table_name FROM information_schema.tables \
             WHERE table_schema = ''public'' AND table_type = ''BASE TABLE'' \
             ORDER BY table_name') ORDER BY table_name"
        );
    }

    #[test]
    fn test_redact_conninfo() {
        assert_eq!(
            redact_conninfo("host=db port=5432 dbname=sales user=u password=hunter2"),
            "host=db port=5432 dbname=sales user=u password=***"
        );
        assert_eq!(
            redact_conninfo("host=db password='a b\\'c' user=u"),
            "host=db password=*** user=u"
        );
        assert_eq!(redact_conninfo("host=db user=u"), "host=db user=u");
    }

    #[test]
    fn test_redact_conninfo_inside_engine_message() {
        let message = "IO Error: Unable to connect to Postgres at \"host=db port=5432 \
                       dbname=sales user=u password=hunter2\": connection refused; \
                       retry with dsn 'user=u password=hunter2'";
        let redacted = redact_conninfo(message);
        assert!(!redacted.contains("hunter2"));
        assert_eq!(redacted.matches("password=***").count(), 2);
        assert!(redacted.ends_with("dsn 'user=u password=***'"));
        assert!(redacted.contains("password=***\": connection refused"));
    }

    proptest! {
        #[test]
        fn quoted_ident_has_balanced_quotes(name in ".*") {
            let quoted = quote_ident(&name);
            prop_assert!(quoted.starts_with('"') && quoted.ends_with('"'));
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("\"\"", ""), name.replace('"', ""));
        }

        #[test]
        fn redacted_conninfo_never_contains_password(secret in "[A-Z0-9]{8,20}") {
            let conninfo = format!("host=db user=u password={} dbname=x", secret);
            let redacted = redact_conninfo(&conninfo);
            prop_assert!(!redacted.contains(&secret));
        }
    }
}
