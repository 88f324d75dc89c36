pub(super) fn is_placeholder_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'$') && bytes.get(idx + 1) == Some(&b'{')
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Recognise `$tag$` (or `$$`) opening a Postgres dollar-quoted body.
///
/// Returns the tag and the index of its closing `$`.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphabetic() || b == b'_' || (idx > start + 1 && b.is_ascii_digit())) {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

/// True when `bytes[idx..]` is the closing `$tag$` for `tag`.
pub(super) fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx) == Some(&b'$')
        && bytes.get(idx + 1..end) == Some(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}
