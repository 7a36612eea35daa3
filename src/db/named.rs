//! Named placeholder compilation.
//!
//! Statements are written with `:name` placeholders. Neither driver binds by
//! name, so before execution the statement is rewritten to positional `?`
//! markers and the values are collected in marker order. Values are always
//! bound by the driver; nothing is ever spliced into the statement text.
//!
//! The scanner skips everything that can legitimately contain a colon:
//! single-quoted strings, double-quoted and backtick identifiers, `--` and
//! `/* */` comments, `::` casts and `:=` assignments.

use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, Params, Value};

/// A statement rewritten to positional markers, with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Compile `:name` placeholders in `sql` to `?` markers for `backend`.
///
/// A name used twice is bound twice. Parameters that the statement never
/// references are ignored. A referenced name missing from `params` fails
/// with [`DbError::InvalidInput`].
pub fn compile(sql: &str, params: &Params, backend: BackendKind) -> DbResult<CompiledStatement> {
    // MySQL treats backslash as an escape inside string literals, SQLite does not.
    let backslash_escapes = backend == BackendKind::ClientServerSql;
    let bytes = sql.as_bytes();
    let len = bytes.len();

    let mut out = String::with_capacity(len);
    let mut values = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            q @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, q, backslash_escapes && q != b'`');
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(len, |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(len, |p| i + 2 + p + 2);
            }
            b':' => match bytes.get(i + 1) {
                Some(b':') => i += 2,
                Some(&b) if is_ident_start(b) => {
                    let start = i + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|&b| !is_ident_continue(b))
                        .map_or(len, |p| start + p);
                    let name = &sql[start..end];
                    let value = params.get(name).ok_or_else(|| {
                        DbError::invalid_input(format!(
                            "No value supplied for placeholder ':{}'",
                            name
                        ))
                    })?;
                    out.push_str(&sql[copied..i]);
                    out.push('?');
                    values.push(value.clone());
                    copied = end;
                    i = end;
                }
                _ => i += 1,
            },
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied..]);
    Ok(CompiledStatement { sql: out, values })
}

/// Return the index just past the closing quote. Doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if backslash_escapes && b == b'\\' {
            j += 2;
        } else if b == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
            } else {
                return j + 1;
            }
        } else {
            j += 1;
        }
    }
    bytes.len()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn sqlite(sql: &str, params: &Params) -> DbResult<CompiledStatement> {
        compile(sql, params, BackendKind::EmbeddedSql)
    }

    #[test]
    fn test_compile_insert() {
        let params = params! { "name" => "Widget", "price" => 9.99 };
        let compiled = sqlite(
            "INSERT INTO item (name, price) VALUES (:name, :price)",
            &params,
        )
        .unwrap();
        assert_eq!(compiled.sql, "INSERT INTO item (name, price) VALUES (?, ?)");
        assert_eq!(
            compiled.values,
            vec![Value::from("Widget"), Value::Float(9.99)]
        );
    }

    #[test]
    fn test_values_follow_marker_order() {
        let params = params! { "id" => 4, "name" => "Bolt", "price" => 1.5 };
        let compiled = sqlite(
            "UPDATE item SET price = :price, name = :name WHERE id = :id",
            &params,
        )
        .unwrap();
        assert_eq!(
            compiled.values,
            vec![Value::Float(1.5), Value::from("Bolt"), Value::Int(4)]
        );
    }

    #[test]
    fn test_repeated_name_binds_twice() {
        let params = params! { "v" => 1 };
        let compiled = sqlite("SELECT :v + :v", &params).unwrap();
        assert_eq!(compiled.sql, "SELECT ? + ?");
        assert_eq!(compiled.values.len(), 2);
    }

    #[test]
    fn test_missing_param_is_invalid_input() {
        let err = sqlite("SELECT * FROM item WHERE id = :id", &Params::new()).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains(":id"));
    }

    #[test]
    fn test_unused_params_ignored() {
        let params = params! { "unused" => 1 };
        let compiled = sqlite("SELECT * FROM item", &params).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM item");
        assert!(compiled.values.is_empty());
    }

    #[test]
    fn test_skips_string_literals_and_identifiers() {
        let params = params! { "id" => 1 };
        let compiled = sqlite(
            r#"SELECT ':not', "col:x", `a:b` FROM item WHERE id = :id AND t = '12:30'"#,
            &params,
        )
        .unwrap();
        assert_eq!(
            compiled.sql,
            r#"SELECT ':not', "col:x", `a:b` FROM item WHERE id = ? AND t = '12:30'"#
        );
        assert_eq!(compiled.values, vec![Value::Int(1)]);
    }

    #[test]
    fn test_doubled_quote_stays_inside_literal() {
        let params = params! { "id" => 1 };
        let compiled = sqlite("SELECT 'it''s :x' WHERE id = :id", &params).unwrap();
        assert_eq!(compiled.sql, "SELECT 'it''s :x' WHERE id = ?");
    }

    #[test]
    fn test_backslash_escape_depends_on_backend() {
        let params = params! { "id" => 1 };
        let sql = r"SELECT 'a\' , :id";

        // MySQL: \' does not close the literal, so :id is still quoted
        let mysql = compile(sql, &params, BackendKind::ClientServerSql).unwrap();
        assert_eq!(mysql.sql, sql);
        assert!(mysql.values.is_empty());

        // SQLite: backslash is an ordinary character
        let lite = sqlite(sql, &params).unwrap();
        assert_eq!(lite.sql, r"SELECT 'a\' , ?");
    }

    #[test]
    fn test_skips_comments() {
        let params = params! { "id" => 1 };
        let compiled = sqlite(
            "SELECT * -- where :nope\nFROM item /* :also */ WHERE id = :id",
            &params,
        )
        .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * -- where :nope\nFROM item /* :also */ WHERE id = ?"
        );
    }

    #[test]
    fn test_cast_and_assignment_untouched() {
        let params = params! { "v" => "1" };
        let compiled = sqlite("SELECT :v::int, @x := 1", &params).unwrap();
        assert_eq!(compiled.sql, "SELECT ?::int, @x := 1");
        assert_eq!(compiled.values, vec![Value::from("1")]);
    }

    #[test]
    fn test_unterminated_literal_does_not_panic() {
        let compiled = sqlite("SELECT ':id", &Params::new()).unwrap();
        assert_eq!(compiled.sql, "SELECT ':id");
        let compiled = sqlite("SELECT /* :id", &Params::new()).unwrap();
        assert_eq!(compiled.sql, "SELECT /* :id");
    }

    #[test]
    fn test_utf8_around_placeholders() {
        let params = params! { "name" => "Grüße" };
        let compiled = sqlite("SELECT 'naïve' AS ü, :name", &params).unwrap();
        assert_eq!(compiled.sql, "SELECT 'naïve' AS ü, ?");
        assert_eq!(compiled.values, vec![Value::from("Grüße")]);
    }
}
