//! Minimal dotenv file reader
//!
//! Values are returned exactly as written (after unquoting). `${VAR}`
//! placeholders are left untouched for the template resolver.

use crate::error::EnvaptError;
use std::fs;
use std::path::Path;

/// Reads and parses an env file.
pub fn read_file(path: &Path) -> Result<Vec<(String, String)>, EnvaptError> {
    let content = fs::read_to_string(path).map_err(|source| EnvaptError::EnvFileRead {
        path: path.display().to_string(),
        source,
    })?;
    let entries = parse(&content);
    tracing::debug!(path = %path.display(), entries = entries.len(), "read env file");
    Ok(entries)
}

/// Parses env file contents into `(key, value)` pairs, in file order.
///
/// Supports `export` prefixes, `#` comments, single quotes (literal), double
/// quotes (with `\n`, `\r`, `\t`, `\"` and `\\` escapes) and backticks.
/// Quoted values may span several lines. Malformed lines are skipped.
pub fn parse(content: &str) -> Vec<(String, String)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim_start();
        i += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(line);

        let Some((key, rest)) = line.split_once('=') else {
            tracing::trace!(line = i, "skipping line without '='");
            continue;
        };

        let key = key.trim();
        if !is_valid_key(key) {
            tracing::trace!(line = i, key, "skipping invalid key");
            continue;
        }

        let rest = rest.trim_start();
        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'' | '`')) => {
                match read_quoted(&rest[1..], quote, &lines[i..]) {
                    Some((value, consumed)) => {
                        i += consumed;
                        value
                    }
                    None => rest.trim_end().to_string(),
                }
            }
            _ => unquoted(rest),
        };

        entries.push((key.to_string(), value));
    }

    entries
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

// Returns the unquoted value and how many extra lines it consumed.
fn read_quoted(first: &str, quote: char, following: &[&str]) -> Option<(String, usize)> {
    let mut body = first.to_string();
    let mut consumed = 0;

    loop {
        if let Some(end) = find_closing(&body, quote) {
            let inner = &body[..end];
            let value = if quote == '"' {
                unescape(inner)
            } else {
                inner.to_string()
            };
            return Some((value, consumed));
        }

        let next = following.get(consumed)?;
        body.push('\n');
        body.push_str(next);
        consumed += 1;
    }
}

fn find_closing(s: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote == '"' {
            escaped = true;
        } else if c == quote {
            return Some(i);
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn unquoted(rest: &str) -> String {
    if rest.starts_with('#') {
        return String::new();
    }

    let end = rest
        .char_indices()
        .find(|&(i, c)| c == '#' && rest[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn get<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_basic_pairs_and_comments() {
        let entries = parse("# comment\nA=1\n\n  B = two words  \nexport C=3\n");
        assert_eq!(entries.len(), 3);
        assert_eq!(get(&entries, "A"), Some("1"));
        assert_eq!(get(&entries, "B"), Some("two words"));
        assert_eq!(get(&entries, "C"), Some("3"));
    }

    #[test]
    fn test_inline_comments() {
        let entries = parse("A=value # note\nB=a#b\nC=#only comment\n");
        assert_eq!(get(&entries, "A"), Some("value"));
        assert_eq!(get(&entries, "B"), Some("a#b"));
        assert_eq!(get(&entries, "C"), Some(""));
    }

    #[test]
    fn test_quotes() {
        let entries = parse(
            "S='literal ${X} \\n'\nD=\"line\\nnext \\\"q\\\"\" # c\nB=`tick`\nH=\"# not comment\"\n",
        );
        assert_eq!(get(&entries, "S"), Some("literal ${X} \\n"));
        assert_eq!(get(&entries, "D"), Some("line\nnext \"q\""));
        assert_eq!(get(&entries, "B"), Some("tick"));
        assert_eq!(get(&entries, "H"), Some("# not comment"));
    }

    #[test]
    fn test_multiline_double_quotes() {
        let entries = parse("KEY=\"-----BEGIN-----\nabc\n-----END-----\"\nNEXT=1\n");
        assert_eq!(get(&entries, "KEY"), Some("-----BEGIN-----\nabc\n-----END-----"));
        assert_eq!(get(&entries, "NEXT"), Some("1"));
    }

    #[test]
    fn test_unterminated_quote_is_literal() {
        let entries = parse("A=\"open\nB=2\n");
        assert_eq!(get(&entries, "A"), Some("\"open"));
        assert_eq!(get(&entries, "B"), Some("2"));
    }

    #[test]
    fn test_templates_are_not_expanded() {
        let entries = parse("URL=http://${HOST}:${PORT}\n");
        assert_eq!(get(&entries, "URL"), Some("http://${HOST}:${PORT}"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let entries = parse("no equals here\n=value\nBAD KEY=1\nOK=yes\n");
        assert_eq!(entries, vec![("OK".to_string(), "yes".to_string())]);
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "FROM_FILE=hello").unwrap();

        let entries = read_file(file.path()).unwrap();
        assert_eq!(get(&entries, "FROM_FILE"), Some("hello"));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_file(Path::new("/definitely/not/here.env")).unwrap_err();
        assert!(matches!(err, EnvaptError::EnvFileRead { .. }));
    }
}
