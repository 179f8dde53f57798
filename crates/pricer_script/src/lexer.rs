//! Tokenisation of event text using logos.
//!
//! Event text is upper-cased before lexing, so keywords and variable names
//! are case-insensitive. Whitespace, including line breaks, separates tokens
//! and is otherwise ignored.
//!
//! # Examples
//!
//! ```
//! use logos::Logos;
//! use pricer_script::lexer::Token;
//!
//! let tokens: Vec<_> = Token::lexer("X PAYS MAX(SPOT() - 100, 0)")
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(tokens[1], Token::Pays);
//! assert_eq!(tokens.len(), 12);
//! ```

use std::fmt;
use std::ops::Range;

use logos::Logos;

/// Script token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // === Keywords ===
    /// Keyword `IF`
    #[token("IF")]
    If,
    /// Keyword `THEN`
    #[token("THEN")]
    Then,
    /// Keyword `ELSE`
    #[token("ELSE")]
    Else,
    /// Keyword `END`
    #[token("END")]
    End,
    /// Keyword `ENDIF`
    #[token("ENDIF")]
    EndIf,
    /// Keyword `PAYS`
    #[token("PAYS")]
    Pays,
    /// Keyword `AND`
    #[token("AND")]
    And,
    /// Keyword `OR`
    #[token("OR")]
    Or,

    // === Operators ===
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `^`
    #[token("^")]
    Caret,
    /// `=`, assignment or equality depending on position
    #[token("=")]
    Eq,
    /// `!=`
    #[token("!=")]
    NotEq,
    /// `<`
    #[token("<")]
    Lt,
    /// `>`
    #[token(">")]
    Gt,
    /// `<=`
    #[token("<=")]
    Le,
    /// `>=`
    #[token(">=")]
    Ge,

    // === Delimiters ===
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`, introduces a comparison epsilon
    #[token(";")]
    Semicolon,
    /// `:`, introduces a comparison epsilon
    #[token(":")]
    Colon,

    // === Literals ===
    /// Numeric literal
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Variable, constant or intrinsic name; starts with a letter
    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// Whether the token compares two expressions.
    pub fn is_comparator(&self) -> bool {
        matches!(
            self,
            Token::Eq | Token::NotEq | Token::Lt | Token::Gt | Token::Le | Token::Ge
        )
    }

    /// Whether the token is a binary arithmetic operator.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Caret
        )
    }

    /// Whether the token closes an `IF` block.
    pub fn is_end(&self) -> bool {
        matches!(self, Token::End | Token::EndIf)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::If => "IF",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::End => "END",
            Token::EndIf => "ENDIF",
            Token::Pays => "PAYS",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Eq => "=",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Number(v) => return write!(f, "{}", v),
            Token::Ident(name) => return write!(f, "{}", name),
        };
        f.write_str(s)
    }
}

/// Lexes `source` into tokens with their byte spans.
///
/// On failure returns the span of the first unrecognised character.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, Range<usize>> {
    Token::lexer(source)
        .spanned()
        .map(|(token, span)| match token {
            Ok(t) => Ok((t, span)),
            Err(()) => Err(span),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("IF X THEN Y ELSE Z ENDIF"),
            vec![
                Token::If,
                Token::Ident("X".into()),
                Token::Then,
                Token::Ident("Y".into()),
                Token::Else,
                Token::Ident("Z".into()),
                Token::EndIf,
            ]
        );
        // Keywords embedded in longer names stay identifiers
        assert_eq!(lex("IFX"), vec![Token::Ident("IFX".into())]);
        assert_eq!(lex("ENDS"), vec![Token::Ident("ENDS".into())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("1"), vec![Token::Number(1.0)]);
        assert_eq!(lex("2.5"), vec![Token::Number(2.5)]);
        assert_eq!(lex(".25"), vec![Token::Number(0.25)]);
        assert_eq!(lex("1E-3"), vec![Token::Number(0.001)]);
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            lex("<= >= != < > ="),
            vec![Token::Le, Token::Ge, Token::NotEq, Token::Lt, Token::Gt, Token::Eq]
        );
    }

    #[test]
    fn test_line_breaks_are_whitespace() {
        assert_eq!(lex("X = 1\nY = 2\r\n").len(), 6);
    }

    #[test]
    fn test_unrecognised_character_span() {
        let err = tokenize("X = 1 # 2").unwrap_err();
        assert_eq!(err, 6..7);
    }

    #[test]
    fn test_names_start_with_a_letter() {
        assert_eq!(lex("X_1"), vec![Token::Ident("X_1".into())]);
        assert_eq!(tokenize("_X = 1").unwrap_err(), 0..1);
    }

    #[test]
    fn test_token_classification() {
        assert!(Token::Ge.is_comparator());
        assert!(!Token::Plus.is_comparator());
        assert!(Token::Caret.is_arithmetic());
        assert!(Token::EndIf.is_end());
    }

    #[test]
    fn test_display_round_trips_operators() {
        for t in [Token::Le, Token::NotEq, Token::Caret, Token::Semicolon] {
            assert_eq!(lex(&t.to_string()), vec![t]);
        }
    }
}
