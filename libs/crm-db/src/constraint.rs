//! Helpers for classifying driver errors and preparing `LIKE` patterns.

/// Name of the violated unique constraint (SQLSTATE 23505), if `err` is one.
///
/// Returns `Some("")` when the server did not report a constraint name.
#[must_use]
pub fn violated_unique_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default())
        }
        _ => None,
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside a `LIKE` pattern.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
