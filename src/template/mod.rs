//! Named-parameter templates.
//!
//! Model code writes SQL with `${name}` placeholders and a [`Params`] map; [`render`]
//! turns that into driver SQL with positional markers plus the ordered argument list.

use std::collections::HashMap;

mod parsers;
mod scanner;

use parsers::{
    closes_dollar_quote, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    is_placeholder_start, try_start_dollar_quote,
};
use scanner::{State, scan_placeholder};

use crate::error::TemplateError;
use crate::types::SqlValue;

/// Positional marker style emitted by [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    fn marker_prefix(self) -> char {
        match self {
            PlaceholderStyle::Postgres => '$',
            PlaceholderStyle::Sqlite => '?',
        }
    }
}

/// Placeholder name to value mapping for one template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, SqlValue>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build a [`Params`] map inline.
///
/// ```rust
/// use sql_connector::params;
///
/// let p = params! { "id" => 7_i64, "name" => "alice" };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::template::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::template::Params::new();
        $(params.insert($name, $value);)+
        params
    }};
}

/// Driver-ready SQL plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Rendered {
    /// A statement with no parameters, passed through untouched.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }
}

/// Render `${name}` placeholders into positional markers.
///
/// Every occurrence gets its own marker and its own copy of the value, in
/// left-to-right order, so `${id}` used twice yields two arguments. Text inside
/// quoted literals, comments, and dollar-quoted bodies is copied verbatim.
///
/// Values must be scalars; build `IN (...)` lists as sub-clauses with one
/// placeholder per element.
///
/// # Errors
/// Returns [`TemplateError::MissingValue`] when a referenced name has no entry in
/// `params`, and [`TemplateError::Unterminated`] / [`TemplateError::InvalidName`]
/// for malformed placeholders. Unreferenced entries in `params` are ignored.
pub fn render(
    template: &str,
    params: &Params,
    style: PlaceholderStyle,
) -> Result<Rendered, TemplateError> {
    let bytes = template.as_bytes();
    let mut sql = String::with_capacity(template.len());
    let mut args = Vec::new();
    let mut state = State::Normal;
    // start of the text not yet copied into `sql`
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' if is_placeholder_start(bytes, idx) => {
                    let placeholder = scan_placeholder(template, idx)?;
                    let value = params.get(placeholder.name).ok_or_else(|| {
                        TemplateError::MissingValue {
                            name: placeholder.name.to_owned(),
                        }
                    })?;
                    args.push(value.clone());
                    sql.push_str(&template[copied..idx]);
                    sql.push(style.marker_prefix());
                    sql.push_str(&args.len().to_string());
                    copied = placeholder.end;
                    idx = placeholder.end;
                    continue;
                }
                b'$' => {
                    if let Some((tag, tag_end)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = tag_end;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if closes_dollar_quote(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    sql.push_str(&template[copied..]);
    Ok(Rendered { sql, args })
}

/// Escape `\`, `%` and `_` so user input matches literally in
/// `LIKE ... ESCAPE '\'`.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_placeholder_postgres() {
        let rendered = render(
            "SELECT * FROM exchanges WHERE id = ${id}",
            &Params::new().with("id", 7),
            PlaceholderStyle::Postgres,
        )
        .unwrap();
        assert_eq!(rendered.sql, "SELECT * FROM exchanges WHERE id = $1");
        assert_eq!(rendered.args, vec![SqlValue::Int(7)]);
    }

    #[test]
    fn occurrences_numbered_left_to_right() {
        let params = params! { "a" => 1, "b" => "two" };
        let rendered = render(
            "select ${b}, ${a}, ${b}",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(rendered.sql, "select ?1, ?2, ?3");
        assert_eq!(
            rendered.args,
            vec![
                SqlValue::Text("two".into()),
                SqlValue::Int(1),
                SqlValue::Text("two".into())
            ]
        );
    }

    #[test]
    fn count_matches_occurrences() {
        let params = params! { "x" => 1 };
        for n in 0..6 {
            let template = vec!["${x}"; n].join(" + ");
            let rendered = render(&template, &params, PlaceholderStyle::Postgres).unwrap();
            assert_eq!(rendered.args.len(), n);
        }
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = render(
            "update t set a = ${a} where id = ${id}",
            &params! { "a" => 1 },
            PlaceholderStyle::Postgres,
        )
        .unwrap_err();
        assert_eq!(err, TemplateError::MissingValue { name: "id".into() });
    }

    #[test]
    fn extra_values_are_ignored() {
        let rendered = render(
            "select 1 where x = ${x}",
            &params! { "x" => 1, "unused" => true },
            PlaceholderStyle::Postgres,
        )
        .unwrap();
        assert_eq!(rendered.args.len(), 1);
    }

    #[test]
    fn malformed_placeholders() {
        let params = params! { "x" => 1 };
        assert_eq!(
            render("select ${x", &params, PlaceholderStyle::Postgres).unwrap_err(),
            TemplateError::Unterminated { offset: 7 }
        );
        assert!(matches!(
            render("select ${1x}", &params, PlaceholderStyle::Postgres).unwrap_err(),
            TemplateError::InvalidName { .. }
        ));
        assert!(matches!(
            render("select ${}", &params, PlaceholderStyle::Postgres).unwrap_err(),
            TemplateError::InvalidName { .. }
        ));
    }

    #[test]
    fn skips_literals_and_comments() {
        let sql = "select '${x}', \"${x}\" -- ${x}\n/* ${x} /* ${x} */ */ from t where a = ${x}";
        let rendered = render(sql, &params! { "x" => 1 }, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(
            rendered.sql,
            "select '${x}', \"${x}\" -- ${x}\n/* ${x} /* ${x} */ */ from t where a = $1"
        );
        assert_eq!(rendered.args.len(), 1);
    }

    #[test]
    fn skips_dollar_quoted_bodies() {
        let sql = "do $body$ select ${x} $body$; select ${x}";
        let rendered = render(sql, &params! { "x" => 1 }, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(rendered.sql, "do $body$ select ${x} $body$; select $1");
    }

    #[test]
    fn keeps_multibyte_text_intact() {
        let rendered = render(
            "select 'café' as name, ${n} as n -- ünïcode",
            &params! { "n" => 1 },
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(rendered.sql, "select 'café' as name, ?1 as n -- ünïcode");
    }

    #[test]
    fn null_values_render_as_arguments() {
        let rendered = render(
            "insert into t(a) values (${a})",
            &params! { "a" => None::<i64> },
            PlaceholderStyle::Postgres,
        )
        .unwrap();
        assert_eq!(rendered.args, vec![SqlValue::Null]);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like(r"50%_off\now"), r"50\%\_off\\now");
        assert_eq!(escape_like("plain"), "plain");
    }
}
