//! Tokenizer for network descriptions.
//!
//! A single anchored regex with one named group per token class is applied at the
//! current offset; the group that matched decides the token.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

pub const KEYWORDS: [&str; 6] = ["if", "then", "else", "new", "true", "false"];

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(&'static str),
    Sym(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

const SYMBOLS: [&str; 22] = [
    "&&", "||", "==", "!=", "<=", ">=", "[", "]", "(", ")", ";", ",", "=", ".", ":", "+", "-",
    "*", "/", "!", "<", ">",
];

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?x)\A(?:
                (?P<space>\s+)
              | (?P<comment>(?://|\#)[^\n]*)
              | (?P<block>/\*(?s:.*?)\*/)
              | (?P<open_block>/\*)
              | (?P<number>\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)
              | (?P<string>'[^'\n]*'|"[^"\n]*")
              | (?P<open_string>['"])
              | (?P<ident>[A-Za-z_][A-Za-z0-9_]*)
              | (?P<sym>&&|\|\||==|!=|<=|>=|[\[\]();,=.:+\-*/!<>])
            )"#,
        )
        .expect("token regex is valid")
    })
}

/// Split `source` into tokens, ending with a single [`Tok::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let re = token_regex();
    let mut tokens = Vec::new();
    let (mut pos, mut line, mut column) = (0, 1, 1);

    while pos < source.len() {
        let rest = &source[pos..];
        let caps = re.captures(rest).ok_or_else(|| {
            let c = rest.chars().next().unwrap_or(' ');
            syntax(line, column, format!("unexpected character '{}'", c))
        })?;
        let text = caps.get(0).map_or("", |m| m.as_str());

        let tok = if caps.name("space").is_some()
            || caps.name("comment").is_some()
            || caps.name("block").is_some()
        {
            None
        } else if caps.name("open_block").is_some() {
            return Err(syntax(line, column, "unterminated comment"));
        } else if caps.name("open_string").is_some() {
            return Err(syntax(line, column, "unterminated string"));
        } else if let Some(m) = caps.name("number") {
            let n = m
                .as_str()
                .parse::<f64>()
                .map_err(|e| syntax(line, column, format!("bad number '{}': {}", m.as_str(), e)))?;
            Some(Tok::Number(n))
        } else if let Some(m) = caps.name("string") {
            let s = m.as_str();
            Some(Tok::Str(s[1..s.len() - 1].to_string()))
        } else if let Some(m) = caps.name("ident") {
            match KEYWORDS.iter().copied().find(|k| *k == m.as_str()) {
                Some(k) => Some(Tok::Keyword(k)),
                None => Some(Tok::Ident(m.as_str().to_string())),
            }
        } else {
            let s = SYMBOLS
                .iter()
                .copied()
                .find(|s| *s == text)
                .ok_or_else(|| syntax(line, column, format!("unexpected '{}'", text)))?;
            Some(Tok::Sym(s))
        };

        if let Some(tok) = tok {
            tokens.push(Token { tok, line, column });
        }
        for c in text.chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        pos += text.len();
    }

    tokens.push(Token {
        tok: Tok::Eof,
        line,
        column,
    });
    Ok(tokens)
}

pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        line,
        column,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn tokens_and_comments() {
        assert_eq!(
            kinds("W = Parameter(3, 2.5e1) # weights\n/* block\n */ z = W.x && 'a'"),
            vec![
                Tok::Ident("W".into()),
                Tok::Sym("="),
                Tok::Ident("Parameter".into()),
                Tok::Sym("("),
                Tok::Number(3.0),
                Tok::Sym(","),
                Tok::Number(25.0),
                Tok::Sym(")"),
                Tok::Ident("z".into()),
                Tok::Sym("="),
                Tok::Ident("W".into()),
                Tok::Sym("."),
                Tok::Ident("x".into()),
                Tok::Sym("&&"),
                Tok::Str("a".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_reserved() {
        assert_eq!(
            kinds("if x then new else true"),
            vec![
                Tok::Keyword("if"),
                Tok::Ident("x".into()),
                Tok::Keyword("then"),
                Tok::Keyword("new"),
                Tok::Keyword("else"),
                Tok::Keyword("true"),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = tokenize("a\n  bb = 'x'").unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 8));
    }

    #[test]
    fn lexical_errors() {
        assert_eq!(
            tokenize("a = 'open").unwrap_err(),
            syntax(1, 5, "unterminated string")
        );
        assert_eq!(
            tokenize("a = 1 /* never closed").unwrap_err(),
            syntax(1, 7, "unterminated comment")
        );
        assert_eq!(
            tokenize("a = $").unwrap_err(),
            syntax(1, 5, "unexpected character '$'")
        );
    }
}
