//! Flat `name=value` parameter text used by old preset entries.
//!
//! Entries are whitespace separated. Names and values may be double quoted;
//! inside quotes `\"` and `\\` escape a quote and a backslash.
//!
//! ```text
//! <Gain,0>=0.5 "<Dry Mix,1>"="0.25"
//! ```

use fxhost_core::AutomationParameters;
use std::iter::Peekable;
use std::str::Chars;

fn read_token(chars: &mut Peekable<Chars<'_>>, stop_at_eq: bool) -> Option<String> {
    let mut token = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        loop {
            match chars.next()? {
                '"' => return Some(token),
                '\\' => token.push(chars.next()?),
                c => token.push(c),
            }
        }
    }
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || (stop_at_eq && c == '=') {
            break;
        }
        token.push(c);
        chars.next();
    }
    Some(token)
}

/// Parse legacy text. Returns `None` on unterminated quotes or missing `=`.
/// Values that are not numbers are skipped.
pub fn parse(text: &str) -> Option<AutomationParameters> {
    let mut params = AutomationParameters::new();
    let mut chars = text.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Some(params);
        }

        let name = read_token(&mut chars, true)?;
        if name.is_empty() || chars.next() != Some('=') {
            return None;
        }
        let value = read_token(&mut chars, false)?;

        match value.trim().parse::<f64>() {
            Ok(v) => {
                params.insert(name, v);
            }
            Err(_) => tracing::debug!("Skipping non-numeric legacy value for {}", name),
        }
    }
}

fn quote(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || c == '=');
    if !needs_quotes {
        return token.to_string();
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

pub fn serialize(params: &AutomationParameters) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", quote(name), value))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_and_quoted() {
        let params = parse(r#"<Gain,0>=0.5 "<Dry Mix,1>"="0.25""#).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["<Gain,0>"], 0.5);
        assert_eq!(params["<Dry Mix,1>"], 0.25);
    }

    #[test]
    fn test_parse_escapes() {
        let params = parse(r#""a\"b\\c"=1"#).unwrap();
        assert_eq!(params[r#"a"b\c"#], 1.0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("novalue").is_none());
        assert!(parse(r#""unterminated=1"#).is_none());
        assert!(parse("=1").is_none());
    }

    #[test]
    fn test_parse_empty_and_non_numeric() {
        assert_eq!(parse("   ").unwrap().len(), 0);
        let params = parse("a=1 b=loud").unwrap();
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_serialize_quotes_when_needed() {
        let mut params = AutomationParameters::new();
        params.insert("<Dry Mix,1>".into(), 0.25);
        params.insert("<Gain,0>".into(), 0.5);
        let text = serialize(&params);
        assert_eq!(text, r#""<Dry Mix,1>"=0.25 <Gain,0>=0.5"#);
        assert_eq!(parse(&text).unwrap(), params);
    }
}
