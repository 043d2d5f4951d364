use chrono::NaiveDate;

/// Up to two uppercase initials, drawn inside node circles.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn format_tenure(start: NaiveDate, today: NaiveDate) -> String {
    let days = (today - start).num_days();
    if days < 0 {
        return format!("starts {start}");
    }

    let years = days / 365;
    let months = (days % 365) / 30;
    match (years, months) {
        (0, 0) => "less than a month".to_owned(),
        (0, months) => format!("{months} mo"),
        (years, 0) => format!("{years} yr"),
        (years, months) => format!("{years} yr {months} mo"),
    }
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut truncated = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    truncated.push('…');
    truncated
}
