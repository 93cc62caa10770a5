//! Comma-separated field escaping
//!
//! Fields containing a comma, quote or line break are wrapped in quotes with
//! inner quotes doubled. [`parse_line`] reverses [`write_row`].

use std::borrow::Cow;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Escape one field
#[must_use]
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([DELIMITER, QUOTE, '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace(QUOTE, "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Join escaped fields into one line, without a terminator
#[must_use]
pub fn write_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split one line into unescaped fields
///
/// Unterminated quotes run to the end of the line.
#[must_use]
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            QUOTE if in_quotes => {
                if chars.peek() == Some(&QUOTE) {
                    current.push(QUOTE);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            QUOTE if current.is_empty() => in_quotes = true,
            DELIMITER if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_field_is_borrowed() {
        assert!(matches!(escape_field("A-100"), Cow::Borrowed("A-100")));
    }

    #[test]
    fn test_quote_and_comma_escaped() {
        assert_eq!(escape_field("a,b\"c"), "\"a,b\"\"c\"");
        assert_eq!(parse_line("\"a,b\"\"c\""), vec!["a,b\"c"]);
    }

    #[test]
    fn test_newline_escaped() {
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_row_round_trip() {
        let fields = ["G-1", "a,b\"c", "", "plain"];
        let line = write_row(fields);
        assert_eq!(line, "G-1,\"a,b\"\"c\",,plain");
        assert_eq!(parse_line(&line), fields);
    }

    #[test]
    fn test_parse_unquoted() {
        assert_eq!(parse_line("x, y ,z"), vec!["x", " y ", "z"]);
        assert_eq!(parse_line(""), vec![""]);
    }
}
