/// Cuts the JSON payload out of a reply that may be wrapped in prose or
/// code fences.
pub fn clean_json_output(raw: &str) -> String {
    let object = raw.find('{').zip(raw.rfind('}'));
    let array = raw.find('[').zip(raw.rfind(']'));

    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };

    match span {
        Some((start, end)) if start <= end => raw[start..=end].to_string(),
        _ => raw.trim().to_string(),
    }
}

/// Truncates long text on a character boundary for log output.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
