use std::{iter::Peekable, str::CharIndices};

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Mut,
    Const,
    Fn,
    Use,
    From,
    As,
    If,
    Else,
    When,
    Loop,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    True,
    False,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Unknown,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some((start, ch)) = self.chars.next() else {
                let end = self.source.len();
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    span: SourceSpan::new(end, end),
                });
                return Ok(tokens);
            };

            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start),
                '"' => self.string_literal(start)?,
                '(' => self.token(start, TokenKind::LParen),
                ')' => self.token(start, TokenKind::RParen),
                '{' => self.token(start, TokenKind::LBrace),
                '}' => self.token(start, TokenKind::RBrace),
                '[' => self.token(start, TokenKind::LBracket),
                ']' => self.token(start, TokenKind::RBracket),
                ',' => self.token(start, TokenKind::Comma),
                '.' => self.token(start, TokenKind::Dot),
                ';' => self.token(start, TokenKind::Semicolon),
                ':' => self.token(start, TokenKind::Colon),
                '+' => self.token(start, TokenKind::Plus),
                '*' => self.token(start, TokenKind::Star),
                '/' => self.token(start, TokenKind::Slash),
                '%' => self.token(start, TokenKind::Percent),
                '-' => self.either(start, '>', TokenKind::Arrow, TokenKind::Minus),
                '=' => self.either(start, '=', TokenKind::EqualEqual, TokenKind::Assign),
                '!' => self.either(start, '=', TokenKind::BangEqual, TokenKind::Bang),
                '<' => self.either(start, '=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.either(start, '=', TokenKind::GreaterEqual, TokenKind::Greater),
                '|' => self.either(start, '|', TokenKind::DoublePipe, TokenKind::Pipe),
                '&' => self.either(start, '&', TokenKind::DoubleAmpersand, TokenKind::Unknown),
                _ => self.token(start, TokenKind::Unknown),
            };
            tokens.push(token);
        }
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.source.len())
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, ch)| *ch == expected).is_some()
    }

    fn token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.offset();
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan::new(start, end),
        }
    }

    fn either(&mut self, start: usize, next: char, matched: TokenKind, single: TokenKind) -> Token {
        let kind = if self.eat(next) { matched } else { single };
        self.token(start, kind)
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

            let source = self.source;
            let rest = &source[self.offset()..];
            if rest.starts_with("//") {
                while self.chars.next_if(|(_, ch)| *ch != '\n').is_some() {}
            } else if rest.starts_with("/*") {
                self.block_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), Diagnostic> {
        let start = self.offset();
        self.chars.next();
        self.chars.next();
        let mut depth = 1;
        while let Some((_, ch)) = self.chars.next() {
            if ch == '/' && self.eat('*') {
                depth += 1;
            } else if ch == '*' && self.eat('/') {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated block comment")
                .with_span(SourceSpan::new(start, self.source.len())),
        )
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while self
            .chars
            .next_if(|(_, ch)| ch.is_alphanumeric() || *ch == '_')
            .is_some()
        {}
        let mut token = self.token(start, TokenKind::Identifier);
        if let Some(keyword) = keyword_for(&token.lexeme) {
            token.kind = TokenKind::Keyword(keyword);
        }
        token
    }

    fn number_literal(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        loop {
            match self.chars.peek().map(|(_, ch)| *ch) {
                Some('0'..='9' | '_') => {
                    self.chars.next();
                }
                // `1.field` is not a float; only consume the dot before a digit.
                Some('.') if !seen_dot && self.digit_after_dot() => {
                    seen_dot = true;
                    self.chars.next();
                }
                Some('e' | 'E') => {
                    self.chars.next();
                    self.chars.next_if(|(_, ch)| matches!(ch, '+' | '-'));
                }
                _ => break,
            }
        }
        self.token(start, TokenKind::Number)
    }

    fn digit_after_dot(&self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        matches!(lookahead.peek(), Some((_, '0'..='9')))
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((idx, ch)) = self.chars.next() {
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span: SourceSpan::new(start, idx + 1),
                    });
                }
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal")
                .with_span(SourceSpan::new(start, self.source.len())),
        )
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "var" => Kw::Var,
        "mut" => Kw::Mut,
        "const" => Kw::Const,
        "fn" => Kw::Fn,
        "use" => Kw::Use,
        "from" => Kw::From,
        "as" => Kw::As,
        "if" => Kw::If,
        "else" => Kw::Else,
        "when" => Kw::When,
        "loop" => Kw::Loop,
        "while" => Kw::While,
        "for" => Kw::For,
        "in" => Kw::In,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "return" => Kw::Return,
        "true" => Kw::True,
        "false" => Kw::False,
        "none" => Kw::None,
        _ => return None,
    };
    Some(keyword)
}
