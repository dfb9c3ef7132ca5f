/// Collapse whitespace and cap the length of provider payloads before they hit the log.
pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let mut compact = String::with_capacity(message.len().min(max_len.saturating_add(16)));
    for word in message.split_whitespace() {
        if !compact.is_empty() {
            compact.push(' ');
        }
        compact.push_str(word);
        if compact.len() > max_len {
            break;
        }
    }
    if compact.len() <= max_len {
        return compact;
    }
    let mut cut = max_len;
    while !compact.is_char_boundary(cut) {
        cut -= 1;
    }
    compact.truncate(cut);
    compact.push_str("...(truncated)");
    compact
}
