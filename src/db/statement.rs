//! Statement classification.
//!
//! Decides whether a statement returns rows or only an affected-row count.
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the backend's dialect;
//! statements the parser rejects (vendor syntax, unusual pragmas) fall back to
//! their leading keyword.

use crate::models::BackendKind;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// What a statement produces when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows (SELECT, WITH, SHOW, EXPLAIN, PRAGMA, VALUES)
    Read,
    /// Returns an affected-row count (DML, DDL, everything else)
    Mutation,
}

const READ_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "PRAGMA", "EXPLAIN", "SHOW", "VALUES", "DESCRIBE", "DESC",
];

fn get_dialect(backend: BackendKind) -> Box<dyn Dialect> {
    match backend {
        BackendKind::EmbeddedSql => Box::new(SQLiteDialect {}),
        BackendKind::ClientServerSql => Box::new(MySqlDialect {}),
        BackendKind::DocumentStore => Box::new(GenericDialect {}),
    }
}

/// Classify a compiled (positional) statement.
pub fn classify(sql: &str, backend: BackendKind) -> StatementKind {
    let dialect = get_dialect(backend);
    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => match statements.last() {
            Some(stmt) => classify_statement(stmt),
            None => StatementKind::Mutation,
        },
        Err(_) => classify_by_keyword(sql),
    }
}

fn classify_statement(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(_)
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. }
        | Statement::Explain { .. }
        | Statement::Pragma { .. } => StatementKind::Read,
        _ => StatementKind::Mutation,
    }
}

fn classify_by_keyword(sql: &str) -> StatementKind {
    let keyword = first_keyword(sql).to_ascii_uppercase();
    if READ_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Read
    } else {
        StatementKind::Mutation
    }
}

/// First word of the statement, after leading whitespace, comments and parens.
fn first_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITE: BackendKind = BackendKind::EmbeddedSql;
    const MY: BackendKind = BackendKind::ClientServerSql;

    #[test]
    fn test_select_is_read() {
        assert_eq!(classify("SELECT * FROM item", LITE), StatementKind::Read);
        assert_eq!(
            classify("select id from item where id = ?", MY),
            StatementKind::Read
        );
        assert_eq!(
            classify("WITH t AS (SELECT 1) SELECT * FROM t", LITE),
            StatementKind::Read
        );
    }

    #[test]
    fn test_dml_is_mutation() {
        assert_eq!(
            classify("INSERT INTO item (name, price) VALUES (?, ?)", LITE),
            StatementKind::Mutation
        );
        assert_eq!(
            classify("UPDATE item SET name = ? WHERE id = ?", MY),
            StatementKind::Mutation
        );
        assert_eq!(
            classify("DELETE FROM item WHERE id = ?", LITE),
            StatementKind::Mutation
        );
    }

    #[test]
    fn test_ddl_is_mutation() {
        assert_eq!(
            classify("CREATE TABLE IF NOT EXISTS item (id INTEGER)", LITE),
            StatementKind::Mutation
        );
        assert_eq!(classify("DROP TABLE item", MY), StatementKind::Mutation);
    }

    #[test]
    fn test_show_and_explain_are_reads() {
        assert_eq!(classify("SHOW TABLES", MY), StatementKind::Read);
        assert_eq!(
            classify("EXPLAIN SELECT * FROM item", MY),
            StatementKind::Read
        );
        assert_eq!(classify("PRAGMA table_info(item)", LITE), StatementKind::Read);
    }

    #[test]
    fn test_unparseable_falls_back_to_keyword() {
        assert_eq!(
            classify("SELECT FROM WHERE ??? garbage", LITE),
            StatementKind::Read
        );
        assert_eq!(
            classify("/* hint */ -- note\n  DESCRIBE item extra junk (", MY),
            StatementKind::Read
        );
        assert_eq!(classify("VACUUM INTO", LITE), StatementKind::Mutation);
    }

    #[test]
    fn test_first_keyword() {
        assert_eq!(first_keyword("  (SELECT 1)"), "SELECT");
        assert_eq!(first_keyword("-- c\ninsert into t"), "insert");
        assert_eq!(first_keyword("/* unterminated"), "");
        assert_eq!(first_keyword(""), "");
    }
}
