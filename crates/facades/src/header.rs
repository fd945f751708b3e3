use http::HeaderValue;

/// Split comma-separated header `values` into their individual entries.
///
/// Each value is split on commas which are not within a double-quoted string.
/// Entries are trimmed of whitespace and of surrounding quotes, and empty
/// entries are dropped. Order and duplicates are preserved.
pub fn split_values<'v>(values: impl IntoIterator<Item = &'v HeaderValue>) -> Vec<String> {
    let mut out = Vec::new();

    for value in values {
        let value = String::from_utf8_lossy(value.as_bytes());
        split_into(&value, &mut out);
    }
    out
}

fn split_into(value: &str, out: &mut Vec<String>) {
    let mut quoted = false;
    let mut escaped = false;
    let mut begin = 0;

    for (index, byte) in value.bytes().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' if quoted => escaped = true,
            b'"' => quoted = !quoted,
            b',' if !quoted => {
                push_entry(&value[begin..index], out);
                begin = index + 1;
            }
            _ => {}
        }
    }
    push_entry(&value[begin..], out);
}

fn push_entry(entry: &str, out: &mut Vec<String>) {
    let entry = entry.trim();
    let entry = entry
        .strip_prefix('"')
        .and_then(|entry| entry.strip_suffix('"'))
        .unwrap_or(entry);

    if !entry.is_empty() {
        out.push(entry.to_string());
    }
}
