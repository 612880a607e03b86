use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Structure
    Newline,
    Semicolon,
    Eof,

    // Literals
    StringLit,
    Integer,
    Float,
    Weight,
    True,
    False,

    // Identifiers & punctuation
    Identifier,
    Dot,
    Comma,
    Colon,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Comparison / arithmetic / boolean
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    AndAnd,
    OrOr,
    Bang,

    // Assignment
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,

    // Keywords
    If,
    Else,
    For,
    In,
    And,
    Or,
    Not,
    State,
}

impl TokenType {
    /// Tokens that end a statement.
    pub fn is_separator(&self) -> bool {
        matches!(self, TokenType::Newline | TokenType::Semicolon)
    }
}

/// Look up a keyword string and return its TokenType, or None if it's a plain identifier.
pub fn keyword_type(word: &str) -> Option<TokenType> {
    match word {
        "if" => Some(TokenType::If),
        "else" => Some(TokenType::Else),
        "for" => Some(TokenType::For),
        "in" => Some(TokenType::In),
        "and" => Some(TokenType::And),
        "or" => Some(TokenType::Or),
        "not" => Some(TokenType::Not),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        "state" => Some(TokenType::State),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_type {
            TokenType::Newline | TokenType::Eof => {
                write!(f, "Token({:?}, {}:{})", self.token_type, self.line, self.column)
            }
            _ => {
                write!(
                    f,
                    "Token({:?}, {:?}, {}:{})",
                    self.token_type, self.value, self.line, self.column
                )
            }
        }
    }
}
