/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an amount in pence as pounds with two decimals (`1250` -> `"12.50"`).
pub fn format_pence(pence: f64) -> String {
    format!("{:.2}", pence / 100.0)
}

/// Age in whole months as `"7 y 3 m"`.
pub fn format_age(months: i64) -> String {
    format!("{} y {} m", months / 12, months % 12)
}

/// Upper-case initials from first and last name; empty when both are blank.
pub fn initials(first: &str, last: &str) -> String {
    [first, last]
        .iter()
        .filter_map(|part| part.trim().chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
