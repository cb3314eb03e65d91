//! Parameter binding utilities for database queries.
//!
//! Templates mark parameters with `?`. Before execution the marks are
//! counted and, when a template has more marks than supplied values, the
//! first value is bound to every mark. This lets a single search term match
//! several columns (`WHERE username LIKE ? OR email LIKE ?`). Callers with
//! several independent values must supply one value per mark.
//!
//! Marks inside single-quoted literals and double-quoted identifiers are not
//! placeholders.

use crate::models::{Dialect, QueryParam};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// A template ready for execution: driver-specific SQL plus one value per mark.
#[derive(Debug)]
pub struct PreparedSql<'a> {
    pub sql: String,
    pub params: Vec<&'a QueryParam>,
}

/// Count the `?` placeholder marks in a template.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan_placeholders(sql, |_| count += 1);
    count
}

/// Rewrite `?` marks to PostgreSQL's numbered `$1, $2, ...` form.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut last = 0;
    let mut n = 0;
    scan_placeholders(sql, |pos| {
        n += 1;
        out.push_str(&sql[last..pos]);
        out.push('$');
        out.push_str(&n.to_string());
        last = pos + 1;
    });
    out.push_str(&sql[last..]);
    out
}

/// Pick the value bound to each of `placeholders` marks.
///
/// With more marks than values, `params[0]` fills every mark; otherwise the
/// values are bound in order and surplus values are ignored.
pub fn expand_params(placeholders: usize, params: &[QueryParam]) -> Vec<&QueryParam> {
    match params.first() {
        Some(first) if placeholders > params.len() => {
            std::iter::repeat_n(first, placeholders).collect()
        }
        _ => params.iter().take(placeholders).collect(),
    }
}

/// Prepare a template for `dialect`: count marks, fan out, renumber if needed.
pub fn prepare<'a>(sql: &str, dialect: Dialect, params: &'a [QueryParam]) -> PreparedSql<'a> {
    let placeholders = count_placeholders(sql);
    let sql = if dialect.uses_numbered_placeholders() {
        number_placeholders(sql)
    } else {
        sql.to_string()
    };
    PreparedSql {
        sql,
        params: expand_params(placeholders, params),
    }
}

/// Call `on_mark` with the byte offset of every `?` outside quotes.
fn scan_placeholders(sql: &str, mut on_mark: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (pos, ch) in sql.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), c) if c == open => quote = None,
            (None, '?') => on_mark(pos),
            _ => {}
        }
    }
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}
