// AISpec lexer
// Hand-rolled tokenizer with line/column tracking and an on-demand raw mode
// for opaque logic bodies.

use std::fmt;

use crate::ParseError;

/// A lexical token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or contextual keyword: `[A-Za-z_][A-Za-z0-9_]*`.
    Ident(String),
    /// Double-quoted string literal, quotes stripped.
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Comma,
    Colon,
    Semi,
    Eq,
    Arrow,
    Eof,
}

impl TokenKind {
    /// True when this token is the identifier `word`.
    pub fn is_ident(&self, word: &str) -> bool {
        matches!(self, TokenKind::Ident(name) if name == word)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "`{}`", name),
            TokenKind::Str(text) => write!(f, "\"{}\"", text),
            TokenKind::LBrace => write!(f, "`{{`"),
            TokenKind::RBrace => write!(f, "`}}`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LBracket => write!(f, "`[`"),
            TokenKind::RBracket => write!(f, "`]`"),
            TokenKind::Lt => write!(f, "`<`"),
            TokenKind::Gt => write!(f, "`>`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Semi => write!(f, "`;`"),
            TokenKind::Eq => write!(f, "`=`"),
            TokenKind::Arrow => write!(f, "`->`"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Character-level scanner over an AISpec source.
///
/// Tokens are produced on demand so the parser can switch the scanner into
/// raw mode at opaque-body positions, mirroring a contextual LALR lexer.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn lex_error(&self, line: u32, column: u32, message: impl Into<String>) -> ParseError {
        ParseError::Lex {
            path: None,
            line,
            column,
            message: message.into(),
        }
    }

    /// Skip whitespace, `//` line comments, and `/* ... */` block comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.src[self.pos..].starts_with("//") => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.src[self.pos..].starts_with("/*") => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        if self.src[self.pos..].starts_with("*/") {
                            self.bump();
                            self.bump();
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(self.lex_error(line, column, "unterminated block comment"));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let token = |kind| Token { kind, line, column };

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(token(TokenKind::Eof)),
        };

        if c.is_ascii_alphabetic() || c == '_' {
            let start = self.pos;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(token(TokenKind::Ident(self.src[start..self.pos].to_string())));
        }

        if c == '"' {
            self.bump();
            let start = self.pos;
            loop {
                match self.peek_char() {
                    Some('"') => {
                        let text = self.src[start..self.pos].to_string();
                        self.bump();
                        return Ok(token(TokenKind::Str(text)));
                    }
                    Some(_) => {
                        self.bump();
                    }
                    None => {
                        return Err(self.lex_error(line, column, "unterminated string literal"))
                    }
                }
            }
        }

        if c == '-' {
            self.bump();
            if self.peek_char() == Some('>') {
                self.bump();
                return Ok(token(TokenKind::Arrow));
            }
            return Err(self.lex_error(line, column, "unexpected character `-`"));
        }

        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Eq,
            other => {
                return Err(self.lex_error(line, column, format!("unexpected character `{}`", other)))
            }
        };
        self.bump();
        Ok(token(kind))
    }

    /// Raw mode: consume everything up to (not including) the next `}` and
    /// return it trimmed. This is the `/[^}]+/` opaque-expression rule; the
    /// parser invokes it only at logic-body positions.
    pub fn raw_until_brace(&mut self) -> Result<String, ParseError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        loop {
            match self.peek_char() {
                Some('}') => break,
                Some(_) => {
                    self.bump();
                }
                None => {
                    return Err(self.lex_error(line, column, "unterminated logic body"));
                }
            }
        }
        Ok(self.src[start..self.pos].trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let done = token.kind == TokenKind::Eof;
            out.push(token.kind);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn tokenizes_declaration_shapes() {
        let out = kinds("system Foo { function baz(x: Int) -> Text; }");
        assert_eq!(
            out,
            vec![
                TokenKind::Ident("system".into()),
                TokenKind::Ident("Foo".into()),
                TokenKind::LBrace,
                TokenKind::Ident("function".into()),
                TokenKind::Ident("baz".into()),
                TokenKind::LParen,
                TokenKind::Ident("x".into()),
                TokenKind::Colon,
                TokenKind::Ident("Int".into()),
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Ident("Text".into()),
                TokenKind::Semi,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        let out = kinds("// leading\nmeta /* inline */ { }");
        assert_eq!(
            out,
            vec![
                TokenKind::Ident("meta".into()),
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_positions() {
        let mut lexer = Lexer::new("system\n  Foo");
        let first = lexer.next_token().unwrap();
        assert_eq!((first.line, first.column), (1, 1));
        let second = lexer.next_token().unwrap();
        assert_eq!((second.line, second.column), (2, 3));
    }

    #[test]
    fn raw_mode_stops_at_brace() {
        let mut lexer = Lexer::new("  state.count >= 0 }");
        let raw = lexer.raw_until_brace().unwrap();
        assert_eq!(raw, "state.count >= 0");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::RBrace);
    }

    #[test]
    fn rejects_bad_characters() {
        let mut lexer = Lexer::new("component @");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        match err {
            ParseError::Lex { line, column, .. } => assert_eq!((line, column), (1, 11)),
            other => panic!("expected lex error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unterminated_string() {
        let mut lexer = Lexer::new("\"open");
        assert!(lexer.next_token().is_err());
    }
}
