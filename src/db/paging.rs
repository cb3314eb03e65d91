//! Dialect-aware paging of query templates.
//!
//! A paged template is wrapped as a subquery so the window applies to the
//! template's full result, whatever clauses it already carries.

use crate::models::{Dialect, Pageable, PagingSyntax};

/// MySQL has no "no limit" keyword; its documentation uses the largest BIGINT UNSIGNED.
const MYSQL_NO_LIMIT: u64 = u64::MAX;

/// Rewrite `template` so it returns only the rows in `pageable`.
///
/// Returns the template unchanged when there is no window to apply.
pub fn format(template: &str, pageable: Option<&Pageable>, dialect: Dialect) -> String {
    let Some(page) = pageable.filter(|p| !p.is_empty()) else {
        return template.to_string();
    };

    let inner = trim_terminator(template);
    let offset = page.offset();
    let limit = page.limit();

    match dialect.paging_syntax() {
        PagingSyntax::LimitOffset => {
            let bound = match (limit, dialect) {
                (Some(n), _) => n.to_string(),
                (None, Dialect::PostgreSQL) => "ALL".to_string(),
                (None, _) => "-1".to_string(),
            };
            format!("SELECT * FROM ({inner}) paged LIMIT {bound} OFFSET {offset}")
        }
        PagingSyntax::LimitComma => {
            let bound = limit.unwrap_or(MYSQL_NO_LIMIT);
            format!("SELECT * FROM ({inner}) paged LIMIT {offset}, {bound}")
        }
        PagingSyntax::OffsetFetch => {
            format!("SELECT * FROM ({inner}) paged {}", offset_fetch(offset, limit))
        }
        PagingSyntax::OrderedOffsetFetch => format!(
            "SELECT * FROM ({inner}) paged ORDER BY (SELECT NULL) {}",
            offset_fetch(offset, limit)
        ),
        PagingSyntax::RowNumber => {
            let upper = limit
                .map(|n| format!(" AND rownumber_ <= {}", offset.saturating_add(n)))
                .unwrap_or_default();
            format!(
                "SELECT * FROM (SELECT paged_.*, ROW_NUMBER() OVER () AS rownumber_ \
                 FROM ({inner}) paged_) numbered_ \
                 WHERE rownumber_ > {offset}{upper} ORDER BY rownumber_"
            )
        }
    }
}

/// Strip trailing `;` and whitespace so a statement can be nested as a subquery.
pub fn trim_terminator(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

fn offset_fetch(offset: u64, limit: Option<u64>) -> String {
    match limit {
        Some(n) => format!("OFFSET {offset} ROWS FETCH NEXT {n} ROWS ONLY"),
        None => format!("OFFSET {offset} ROWS"),
    }
}
