pub mod tokens;

use thiserror::Error;
use tokens::{keyword_type, Token, TokenType};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{column}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Unit suffixes that turn a number literal into a weight literal.
const WEIGHT_UNITS: &[&str] = &["lb", "kg"];

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        while !self.at_end() {
            let ch = self.peek();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.tokens.push(self.make_token(TokenType::Newline, "\n"));
                    self.advance();
                }
                '/' if self.peek_ahead(1) == Some('/') => self.skip_comment(),
                _ => self.scan_token()?,
            }
        }

        self.tokens.push(self.make_token(TokenType::Eof, ""));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let ch = self.peek();

        if ch == '"' {
            return self.scan_string();
        }

        if ch.is_ascii_digit() || (ch == '.' && self.peek_ahead(1).map_or(false, |c| c.is_ascii_digit())) {
            return self.scan_number();
        }

        // Two-character operators
        let two = match (ch, self.peek_ahead(1)) {
            ('=', Some('=')) => Some(TokenType::Equals),
            ('!', Some('=')) => Some(TokenType::NotEquals),
            ('<', Some('=')) => Some(TokenType::LessEqual),
            ('>', Some('=')) => Some(TokenType::GreaterEqual),
            ('+', Some('=')) => Some(TokenType::PlusAssign),
            ('-', Some('=')) => Some(TokenType::MinusAssign),
            ('*', Some('=')) => Some(TokenType::StarAssign),
            ('/', Some('=')) => Some(TokenType::SlashAssign),
            ('&', Some('&')) => Some(TokenType::AndAnd),
            ('|', Some('|')) => Some(TokenType::OrOr),
            _ => None,
        };
        if let Some(tt) = two {
            let text: String = self.source[self.pos..self.pos + 2].iter().collect();
            self.tokens.push(self.make_token(tt, &text));
            self.advance();
            self.advance();
            return Ok(());
        }

        let single = match ch {
            '(' => Some(TokenType::LParen),
            ')' => Some(TokenType::RParen),
            '[' => Some(TokenType::LBracket),
            ']' => Some(TokenType::RBracket),
            '{' => Some(TokenType::LBrace),
            '}' => Some(TokenType::RBrace),
            ',' => Some(TokenType::Comma),
            ':' => Some(TokenType::Colon),
            ';' => Some(TokenType::Semicolon),
            '?' => Some(TokenType::Question),
            '.' => Some(TokenType::Dot),
            '+' => Some(TokenType::Plus),
            '-' => Some(TokenType::Minus),
            '*' => Some(TokenType::Star),
            '/' => Some(TokenType::Slash),
            '<' => Some(TokenType::LessThan),
            '>' => Some(TokenType::GreaterThan),
            '=' => Some(TokenType::Assign),
            '!' => Some(TokenType::Bang),
            _ => None,
        };

        if let Some(tt) = single {
            let s = ch.to_string();
            self.tokens.push(self.make_token(tt, &s));
            self.advance();
            return Ok(());
        }

        if ch.is_alphabetic() || ch == '_' {
            return self.scan_identifier();
        }

        Err(self.error(format!("Unexpected character: {:?}", ch)))
    }

    fn scan_string(&mut self) -> Result<(), LexerError> {
        let start_line = self.line;
        let start_col = self.column;
        self.advance(); // opening quote
        let mut chars = String::new();

        while !self.at_end() && self.peek() != '"' {
            if self.peek() == '\n' {
                return Err(LexerError {
                    message: "Unterminated string literal".to_string(),
                    line: start_line,
                    column: start_col,
                });
            }
            if self.peek() == '\\' {
                self.advance();
                if self.at_end() {
                    break;
                }
                match self.peek() {
                    'n' => chars.push('\n'),
                    't' => chars.push('\t'),
                    other => chars.push(other),
                }
            } else {
                chars.push(self.peek());
            }
            self.advance();
        }

        if self.at_end() {
            return Err(LexerError {
                message: "Unterminated string literal".to_string(),
                line: start_line,
                column: start_col,
            });
        }

        self.advance(); // closing quote
        self.tokens.push(Token {
            token_type: TokenType::StringLit,
            value: chars,
            line: start_line,
            column: start_col,
        });
        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut num_chars = String::new();
        let mut seen_dot = false;

        while !self.at_end() && (self.peek().is_ascii_digit() || self.peek() == '.') {
            if self.peek() == '.' {
                if seen_dot || self.peek_ahead(1).map_or(true, |c| !c.is_ascii_digit()) {
                    break;
                }
                seen_dot = true;
            }
            num_chars.push(self.peek());
            self.advance();
        }

        // A unit suffix glued to the digits makes this a weight literal: `5lb`, `2.5kg`.
        for unit in WEIGHT_UNITS {
            if self.matches_word(unit) {
                for _ in 0..unit.len() {
                    self.advance();
                }
                num_chars.push_str(unit);
                self.tokens.push(Token {
                    token_type: TokenType::Weight,
                    value: num_chars,
                    line: self.line,
                    column: start_col,
                });
                return Ok(());
            }
        }

        if !self.at_end() && (self.peek().is_alphabetic() || self.peek() == '_') {
            return Err(self.error(format!(
                "Invalid numeric literal: {}{}",
                num_chars,
                self.peek()
            )));
        }

        let tt = if seen_dot {
            TokenType::Float
        } else {
            TokenType::Integer
        };
        self.tokens.push(Token {
            token_type: tt,
            value: num_chars,
            line: self.line,
            column: start_col,
        });
        Ok(())
    }

    fn scan_identifier(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut word = String::new();

        while !self.at_end() && (self.peek().is_alphanumeric() || self.peek() == '_') {
            word.push(self.peek());
            self.advance();
        }

        let tt = keyword_type(&word).unwrap_or(TokenType::Identifier);
        self.tokens.push(Token {
            token_type: tt,
            value: word,
            line: self.line,
            column: start_col,
        });
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// True when `word` starts at the cursor and is not the prefix of a longer identifier.
    fn matches_word(&self, word: &str) -> bool {
        let mut offset = 0;
        for expected in word.chars() {
            if self.peek_ahead(offset) != Some(expected) {
                return false;
            }
            offset += 1;
        }
        self.peek_ahead(offset)
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    }

    fn peek(&self) -> char {
        self.source[self.pos]
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn skip_comment(&mut self) {
        while !self.at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn make_token(&self, token_type: TokenType, value: &str) -> Token {
        Token {
            token_type,
            value: value.to_string(),
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: String) -> LexerError {
        LexerError {
            message,
            line: self.line,
            column: self.column,
        }
    }
}
