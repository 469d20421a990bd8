use std::fmt;

use phf::phf_map;

use crate::diagnostics::ErrorKind;

pub(super) static KEYWORDS: phf::Map<&str, TokenKind> = phf_map! {
    "program" => TokenKind::Program,
    "begin" => TokenKind::Begin,
    "end" => TokenKind::End,
    "const" => TokenKind::Const,
    "type" => TokenKind::Type,
    "var" => TokenKind::Var,
    "array" => TokenKind::Array,
    "of" => TokenKind::Of,
    "record" => TokenKind::Record,
    "procedure" => TokenKind::Procedure,
    "function" => TokenKind::Function,
    "if" => TokenKind::If,
    "then" => TokenKind::Then,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "do" => TokenKind::Do,
    "repeat" => TokenKind::Repeat,
    "until" => TokenKind::Until,
    "for" => TokenKind::For,
    "to" => TokenKind::To,
    "downto" => TokenKind::Downto,
    "case" => TokenKind::Case,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "not" => TokenKind::Not,
    "div" => TokenKind::Div,
    "mod" => TokenKind::Mod,
    "exit" => TokenKind::Exit,
};

pub(super) static TWO_SYMBOLS_TOKENS: phf::Map<&str, TokenKind> = phf_map! {
    ":=" => TokenKind::Assign,
    "<=" => TokenKind::LessEqual,
    ">=" => TokenKind::GreaterEqual,
    "<>" => TokenKind::NotEqual,
    ".." => TokenKind::DotDot,
};

pub(super) static ONE_SYMBOL_TOKENS: phf::Map<char, TokenKind> = phf_map! {
    '+' => TokenKind::Plus,
    '-' => TokenKind::Minus,
    '*' => TokenKind::Star,
    '/' => TokenKind::Slash,
    '=' => TokenKind::Equal,
    '<' => TokenKind::LessThan,
    '>' => TokenKind::GreaterThan,
    ':' => TokenKind::Colon,
    ';' => TokenKind::Semicolon,
    ',' => TokenKind::Comma,
    '.' => TokenKind::Dot,
    '(' => TokenKind::OpenParen,
    ')' => TokenKind::CloseParen,
    '[' => TokenKind::OpenSquareBrace,
    ']' => TokenKind::CloseSquareBrace,
};

/// 1-based line and column of a character in the source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    IntLit(i64),
    RealLit(f64),
    StrLit(String),

    Program,
    Begin,
    End,
    Const,
    Type,
    Var,
    Array,
    Of,
    Record,
    Procedure,
    Function,
    If,
    Then,
    Else,
    While,
    Do,
    Repeat,
    Until,
    For,
    To,
    Downto,
    Case,
    And,
    Or,
    Not,
    Div,
    Mod,
    Exit,

    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Assign,
    Colon,
    Semicolon,
    Comma,
    Dot,
    DotDot,
    OpenParen,
    CloseParen,
    OpenSquareBrace,
    CloseSquareBrace,

    /// A lexeme the lexer could not classify. Scanning resumes after it.
    Error(ErrorKind),
    Eof,
}

impl TokenKind {
    /// Same variant, ignoring any payload.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Tokens the parser resynchronizes on after a syntax error.
    pub fn is_sync_point(&self) -> bool {
        matches!(
            self,
            TokenKind::Semicolon
                | TokenKind::End
                | TokenKind::Begin
                | TokenKind::Const
                | TokenKind::Type
                | TokenKind::Var
                | TokenKind::Procedure
                | TokenKind::Function
                | TokenKind::Eof
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Ident(name) => return write!(f, "identifier '{name}'"),
            TokenKind::IntLit(n) => return write!(f, "integer {n}"),
            TokenKind::RealLit(x) => return write!(f, "real {x}"),
            TokenKind::StrLit(s) => return write!(f, "string '{s}'"),
            TokenKind::Error(e) => return write!(f, "invalid token ({e})"),
            TokenKind::Eof => "end of input",
            TokenKind::Program => "'program'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::Const => "'const'",
            TokenKind::Type => "'type'",
            TokenKind::Var => "'var'",
            TokenKind::Array => "'array'",
            TokenKind::Of => "'of'",
            TokenKind::Record => "'record'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Function => "'function'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Repeat => "'repeat'",
            TokenKind::Until => "'until'",
            TokenKind::For => "'for'",
            TokenKind::To => "'to'",
            TokenKind::Downto => "'downto'",
            TokenKind::Case => "'case'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::Div => "'div'",
            TokenKind::Mod => "'mod'",
            TokenKind::Exit => "'exit'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::LessThan => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Assign => "':='",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::DotDot => "'..'",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::OpenSquareBrace => "'['",
            TokenKind::CloseSquareBrace => "']'",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}
