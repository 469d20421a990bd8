use crate::diagnostics::ErrorKind;

use super::{
    token::{KEYWORDS, ONE_SYMBOL_TOKENS, TWO_SYMBOLS_TOKENS},
    Position, Token, TokenKind,
};

/// Lazy tokenizer. Yields tokens up to and including a single `Eof`, then
/// stops. Unrecognized input becomes an [`TokenKind::Error`] token and
/// scanning carries on after it.
#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Rewind to the start of the source.
    pub fn reset(&mut self) {
        self.index = 0;
        self.line = 1;
        self.column = 1;
        self.finished = false;
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.get(self.index + n).copied()
    }

    fn current_pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and comments. Returns an error token for a comment
    /// that is still open at the end of input.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match (self.peek(), self.peek_nth(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('{'), _) => {
                    let start = self.current_pos();
                    self.bump();
                    if !self.skip_until(&['}']) {
                        return Some(Token::new(
                            TokenKind::Error(ErrorKind::UnterminatedComment),
                            start,
                        ));
                    }
                }
                (Some('('), Some('*')) => {
                    let start = self.current_pos();
                    self.bump();
                    self.bump();
                    if !self.skip_until(&['*', ')']) {
                        return Some(Token::new(
                            TokenKind::Error(ErrorKind::UnterminatedComment),
                            start,
                        ));
                    }
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                _ => return None,
            }
        }
    }

    /// Consumes input up to and including `closing`. False if the input ran
    /// out first.
    fn skip_until(&mut self, closing: &[char]) -> bool {
        while self.peek().is_some() {
            if closing
                .iter()
                .enumerate()
                .all(|(i, &c)| self.peek_nth(i) == Some(c))
            {
                for _ in closing {
                    self.bump();
                }
                return true;
            }
            self.bump();
        }
        false
    }

    fn parse_number(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            s.push(c);
            self.bump();
        }

        let mut is_real = false;
        // `1..10` is a range, not the real `1.`
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            is_real = true;
            s.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                s.push(c);
                self.bump();
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_nth(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_real = true;
                for _ in 0..digit_at {
                    s.extend(self.bump());
                }
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    s.push(c);
                    self.bump();
                }
            }
        }

        if is_real {
            match s.parse() {
                Ok(value) => TokenKind::RealLit(value),
                Err(_) => TokenKind::Error(ErrorKind::IntegerOutOfRange(s)),
            }
        } else {
            match s.parse() {
                Ok(value) => TokenKind::IntLit(value),
                Err(_) => TokenKind::Error(ErrorKind::IntegerOutOfRange(s)),
            }
        }
    }

    fn parse_identifier(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(c) = self
            .peek()
            .filter(|&c| c.is_ascii_alphanumeric() || c == '_')
        {
            s.push(c);
            self.bump();
        }

        match KEYWORDS.get(s.to_ascii_lowercase().as_str()) {
            Some(kind) => kind.clone(),
            None => TokenKind::Ident(s),
        }
    }

    /// A quoted string; `''` stands for one quote. The literal must close on
    /// the line it opened on.
    fn parse_string(&mut self) -> TokenKind {
        self.bump();
        let mut s = String::new();
        loop {
            match self.peek() {
                Some('\'') if self.peek_nth(1) == Some('\'') => {
                    s.push('\'');
                    self.bump();
                    self.bump();
                }
                Some('\'') => {
                    self.bump();
                    return TokenKind::StrLit(s);
                }
                None | Some('\n') => return TokenKind::Error(ErrorKind::UnterminatedString),
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
    }

    fn parse_symbol(&mut self, c: char) -> TokenKind {
        let c2: String = self.chars[self.index..].iter().take(2).collect();
        if let Some(kind) = TWO_SYMBOLS_TOKENS.get(c2.as_str()) {
            self.bump();
            self.bump();
            kind.clone()
        } else if let Some(kind) = ONE_SYMBOL_TOKENS.get(&c) {
            self.bump();
            kind.clone()
        } else {
            self.bump();
            TokenKind::Error(ErrorKind::UnrecognizedCharacter(c))
        }
    }

    fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_trivia() {
            return error;
        }

        let pos = self.current_pos();
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_identifier(),
            Some('\'') => self.parse_string(),
            Some(c) => self.parse_symbol(c),
        };
        Token::new(kind, pos)
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}
