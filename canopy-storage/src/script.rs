//! Splitting of multi-statement scripts.

/// Splits a SQL script on top-level `;`.
///
/// Semicolons inside string literals, quoted identifiers, `--` and `/* */`
/// comments, and `$tag$` dollar-quoted bodies do not split. Segments that
/// hold nothing but whitespace and comments are dropped. Returned
/// statements are trimmed and carry no trailing `;`.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let backslash_escapes = bytes[i] == b'\'' && starts_escape_string(bytes, i);
                i = skip_quoted(bytes, i, bytes[i], backslash_escapes);
                has_code = true;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                continue;
            }
            b'$' => {
                if let Some(tag_end) = dollar_tag_end(bytes, i) {
                    let tag = &bytes[i..=tag_end];
                    i = find(bytes, tag_end + 1, tag).map_or(bytes.len(), |p| p + tag.len());
                    has_code = true;
                    continue;
                }
            }
            b';' => {
                if has_code {
                    push_trimmed(&mut statements, &script[start..i]);
                }
                start = i + 1;
                has_code = false;
                i += 1;
                continue;
            }
            b if !b.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    if has_code {
        push_trimmed(&mut statements, &script[start..]);
    }
    statements
}

fn push_trimmed(out: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// True when the quote at `open` is prefixed by a standalone `E`, as in
/// `E'it\'s'`.
fn starts_escape_string(bytes: &[u8], open: usize) -> bool {
    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
    match open.checked_sub(1).map(|p| bytes[p]) {
        Some(b'e' | b'E') => open < 2 || !is_word_byte(bytes[open - 2]),
        _ => false,
    }
}

/// Returns the index just past the closing quote. Doubled quotes escape,
/// and so does a backslash inside an escape string.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// For `$tag$` starting at `start`, returns the index of the closing `$` of
/// the opening tag. Positional parameters like `$1` are not tags.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'$' => return Some(i),
            b if b.is_ascii_alphabetic() || b == b'_' => {}
            b if b.is_ascii_digit() && i > start + 1 => {}
            _ => return None,
        }
        i += 1;
    }
    None
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}
