use crate::error::TemplateError;

/// Lexical region the renderer is currently inside.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A `${name}` occurrence: the name and the byte index just past the `}`.
pub(super) struct Placeholder<'a> {
    pub(super) name: &'a str,
    pub(super) end: usize,
}

/// Scan the placeholder whose `$` sits at `start` (the caller has already
/// checked that `{` follows).
pub(super) fn scan_placeholder(sql: &str, start: usize) -> Result<Placeholder<'_>, TemplateError> {
    let name_start = start + 2;
    let Some(close) = sql[name_start..].find('}') else {
        return Err(TemplateError::Unterminated { offset: start });
    };
    let name = &sql[name_start..name_start + close];
    if !is_identifier(name) {
        return Err(TemplateError::InvalidName {
            name: name.to_owned(),
            offset: start,
        });
    }
    Ok(Placeholder {
        name,
        end: name_start + close + 1,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
