/// Format an amount with its currency, grouping thousands.
/// USD, EUR and GBP get their symbol; other codes are appended.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let number = format!("{}.{:02}", whole, cents % 100);

    match currency.to_uppercase().as_str() {
        "USD" => format!("{}${}", sign, number),
        "EUR" => format!("{}€{}", sign, number),
        "GBP" => format!("{}£{}", sign, number),
        other => format!("{}{} {}", sign, number, other),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

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

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if date.len() >= 10 && date.is_char_boundary(10) {
        // Keep the YYYY-MM-DD prefix
        date[..10].to_string()
    } else {
        date.to_string()
    }
}

/// Remaining session time for the status bar
pub fn format_remaining(minutes: i64) -> String {
    match minutes {
        m if m <= 0 => "less than a minute".to_string(),
        m if m < 60 => format!("{} min", m),
        m => format!("{}h {:02}m", m / 60, m % 60),
    }
}
