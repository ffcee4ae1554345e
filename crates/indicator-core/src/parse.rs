//! pt-BR numeric parsing shared by the site clients.
//!
//! Brazilian pages format numbers with `.` as the thousands separator
//! and `,` as the decimal mark, often prefixed with `R$` or suffixed
//! with `%`. Unparseable input is `None`, never an error.

/// Parse a pt-BR decimal, tolerating `R$` and `%` decoration.
pub fn parse_decimal_pt(value: &str) -> Option<f64> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }

    let v = v.replace("R$", "").replace('%', "");
    let v = v.trim().replace('.', "").replace(',', ".");
    v.parse().ok()
}

/// Parse a pt-BR integer (thousands dots removed, sign kept).
pub fn parse_int_pt(value: &str) -> Option<i64> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }

    let v = v.replace('.', "");
    let digits = v.strip_prefix(['+', '-']).unwrap_or(&v);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    v.parse().ok()
}
