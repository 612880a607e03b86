use thiserror::Error;

use crate::ast::*;
use crate::lexer::tokens::{Token, TokenType};
use crate::runtime::value::Unit;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Bounds the height of the syntax tree. Parenthesised groups, nested
/// blocks, unary operators and every chained operand or index count one level.
const MAX_PARSER_DEPTH: usize = 64;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Names bound by enclosing `for` loops; they cannot be assigned to.
    loop_vars: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            loop_vars: Vec::new(),
        }
    }

    fn enter_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            Err(self.error_here(format!(
                "Maximum nesting depth ({}) exceeded, expression is too deeply nested",
                MAX_PARSER_DEPTH
            )))
        } else {
            Ok(())
        }
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    // ── Public API ──────────────────────────────────────────────────────

    pub fn parse(&mut self) -> Result<Vec<Statement>, ParseError> {
        let statements = self.parse_statement_list(TokenType::Eof)?;
        self.expect(TokenType::Eof)?;
        Ok(statements)
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// Parse statements up to (not including) `terminator`.
    fn parse_statement_list(&mut self, terminator: TokenType) -> Result<Vec<Statement>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.check(terminator) || self.at_end() {
                break;
            }
            stmts.push(self.parse_statement()?);

            // Every statement ends in a separator, the closing token, or EOF.
            let tt = self.current().token_type;
            if !(tt.is_separator() || tt == terminator || tt == TokenType::Eof) {
                let tok = self.current();
                return Err(ParseError {
                    message: format!("Expected ';' or newline after statement, got {:?}", tok.value),
                    line: tok.line,
                    column: tok.column,
                });
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        self.enter_depth()?;
        let result = match self.current().token_type {
            TokenType::If => self.parse_if_stmt(),
            TokenType::For => self.parse_for_stmt(),
            TokenType::Identifier | TokenType::State => self.parse_assignment(),
            _ => {
                let tok = self.current();
                Err(ParseError {
                    message: format!(
                        "Expected assignment, 'if' or 'for', got {:?} ({:?})",
                        tok.token_type, tok.value
                    ),
                    line: tok.line,
                    column: tok.column,
                })
            }
        };
        self.exit_depth();
        result
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.skip_newlines();
        self.expect(TokenType::LBrace)?;
        let body = self.parse_statement_list(TokenType::RBrace)?;
        self.expect(TokenType::RBrace)?;
        Ok(body)
    }

    fn parse_if_stmt(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        self.expect(TokenType::If)?;
        self.expect(TokenType::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenType::RParen)?;
        let then_body = self.parse_block()?;

        // `else` may sit on the line after the closing brace.
        let mut else_body = Vec::new();
        let checkpoint = self.pos;
        self.skip_newlines();
        if self.check(TokenType::Else) {
            self.advance();
            if self.check(TokenType::If) {
                else_body.push(self.parse_statement()?);
            } else {
                else_body = self.parse_block()?;
            }
        } else {
            self.pos = checkpoint;
        }

        Ok(Statement::If {
            condition,
            then_body,
            else_body,
            loc,
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        self.expect(TokenType::For)?;
        self.expect(TokenType::LParen)?;
        let var = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::In)?;
        let iterable = self.parse_expression()?;
        self.expect(TokenType::RParen)?;

        self.loop_vars.push(var.clone());
        let body = self.parse_block();
        self.loop_vars.pop();

        Ok(Statement::For {
            var,
            iterable,
            body: body?,
            loc,
        })
    }

    fn parse_assignment(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        let target = self.parse_target()?;

        let op_tok = self.current().clone();
        let op = match op_tok.token_type {
            TokenType::Assign => AssignOp::Assign,
            TokenType::PlusAssign => AssignOp::Add,
            TokenType::MinusAssign => AssignOp::Subtract,
            TokenType::StarAssign => AssignOp::Multiply,
            TokenType::SlashAssign => AssignOp::Divide,
            _ => {
                return Err(ParseError {
                    message: format!(
                        "Expected assignment operator (=, +=, -=, *=, /=) after '{}', got {:?}",
                        target.name, op_tok.value
                    ),
                    line: op_tok.line,
                    column: op_tok.column,
                });
            }
        };
        self.advance();
        let value = self.parse_expression()?;

        Ok(Statement::Assignment {
            target,
            op,
            value,
            loc,
        })
    }

    fn parse_target(&mut self) -> Result<Target, ParseError> {
        let loc = self.loc();
        let qualified = self.check(TokenType::State);
        let name = if qualified {
            self.advance();
            self.expect(TokenType::Dot)?;
            self.expect(TokenType::Identifier)?.value.clone()
        } else {
            self.expect(TokenType::Identifier)?.value.clone()
        };

        if !qualified && self.loop_vars.iter().any(|v| v == &name) {
            return Err(ParseError {
                message: format!("Cannot assign to loop variable '{}'", name),
                line: loc.line,
                column: loc.column,
            });
        }

        let mut path = Vec::new();
        while self.check(TokenType::LBracket) {
            self.advance();
            path.extend(self.parse_path_components(true)?);
            self.expect(TokenType::RBracket)?;
        }

        Ok(Target {
            name,
            qualified,
            path,
            loc,
        })
    }

    /// Parse `a:b:*` inside brackets. Wildcards are only accepted in targets.
    fn parse_path_components(&mut self, allow_wildcard: bool) -> Result<Vec<PathComponent>, ParseError> {
        let mut components = Vec::new();
        loop {
            if self.check(TokenType::Star) {
                if !allow_wildcard {
                    return Err(self.error_here(
                        "Wildcard '*' is only allowed in assignment targets".to_string(),
                    ));
                }
                self.advance();
                components.push(PathComponent::Wildcard);
            } else {
                components.push(PathComponent::Index(self.parse_expression()?));
            }
            if self.check(TokenType::Colon) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(components)
    }

    // ── Expressions (precedence climbing) ───────────────────────────────

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.enter_depth()?;
        let result = self.parse_ternary();
        self.exit_depth();
        result
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_or_expr()?;
        if !self.check(TokenType::Question) {
            return Ok(condition);
        }
        self.advance();
        let then_value = self.parse_expression()?;
        self.expect(TokenType::Colon)?;
        let else_value = self.parse_expression()?;
        Ok(Expr::Ternary {
            loc: condition.loc(),
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        })
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_and_expr, |tt| match tt {
            TokenType::OrOr | TokenType::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_comparison, |tt| match tt {
            TokenType::AndAnd | TokenType::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_additive, |tt| match tt {
            TokenType::Equals => Some(BinaryOp::Eq),
            TokenType::NotEquals => Some(BinaryOp::NotEq),
            TokenType::LessThan => Some(BinaryOp::Lt),
            TokenType::LessEqual => Some(BinaryOp::LtEq),
            TokenType::GreaterThan => Some(BinaryOp::Gt),
            TokenType::GreaterEqual => Some(BinaryOp::GtEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_multiplicative, |tt| match tt {
            TokenType::Plus => Some(BinaryOp::Add),
            TokenType::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_unary, |tt| match tt {
            TokenType::Star => Some(BinaryOp::Mul),
            TokenType::Slash => Some(BinaryOp::Div),
            _ => None,
        })
    }

    /// `operand (op operand)*`, folded to the left. Each chained operand
    /// deepens the tree by one, so it is charged against the depth limit.
    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(TokenType) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let base = self.depth;
        let result = self.parse_chain(operand, operator);
        self.depth = base;
        result
    }

    fn parse_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(TokenType) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.current().token_type) {
            self.advance();
            self.enter_depth()?;
            let right = operand(self)?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current().token_type {
            TokenType::Minus => UnaryOp::Neg,
            TokenType::Bang | TokenType::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let loc = self.loc();
        self.advance();
        self.enter_depth()?;
        let operand = self.parse_unary();
        self.exit_depth();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
            loc,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let result = self.parse_index_chain();
        self.depth = base;
        result
    }

    fn parse_index_chain(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.check(TokenType::LBracket) {
            self.advance();
            for component in self.parse_path_components(false)? {
                if let PathComponent::Index(index) = component {
                    self.enter_depth()?;
                    let loc = expr.loc();
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        loc,
                    };
                }
            }
            self.expect(TokenType::RBracket)?;
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        let tok = self.current().clone();

        match tok.token_type {
            TokenType::Integer | TokenType::Float => {
                self.advance();
                let value = parse_number(&tok, &tok.value)?;
                Ok(Expr::Number { value, loc })
            }
            TokenType::Weight => {
                self.advance();
                let (digits, unit) = split_weight_literal(&tok)?;
                let value = parse_number(&tok, digits)?;
                Ok(Expr::Weight { value, unit, loc })
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Bool { value: true, loc })
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Bool { value: false, loc })
            }
            TokenType::StringLit => {
                self.advance();
                Ok(Expr::Str {
                    value: tok.value.clone(),
                    loc,
                })
            }
            TokenType::State => {
                self.advance();
                self.expect(TokenType::Dot)?;
                let name = self.expect(TokenType::Identifier)?.value.clone();
                Ok(Expr::StateVar { name, loc })
            }
            TokenType::Identifier => {
                self.advance();
                if self.check(TokenType::LParen) {
                    self.advance();
                    let arguments = self.parse_argument_list()?;
                    self.expect(TokenType::RParen)?;
                    return Ok(Expr::Call {
                        name: tok.value.clone(),
                        arguments,
                        loc,
                    });
                }
                Ok(Expr::Identifier {
                    name: tok.value.clone(),
                    loc,
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                Ok(expr)
            }
            _ => Err(ParseError {
                message: format!(
                    "Expected expression, got {:?} ({:?})",
                    tok.token_type, tok.value
                ),
                line: tok.line,
                column: tok.column,
            }),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenType::RParen) {
            args.push(self.parse_expression()?);
            while self.check(TokenType::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        Ok(args)
    }

    // ── Token helpers ───────────────────────────────────────────────────

    fn current(&self) -> &Token {
        if self.pos >= self.tokens.len() {
            &self.tokens[self.tokens.len() - 1] // EOF
        } else {
            &self.tokens[self.pos]
        }
    }

    fn advance(&mut self) -> &Token {
        let pos = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[pos]
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType) -> Result<&Token, ParseError> {
        let tok = self.current();
        if tok.token_type != token_type {
            return Err(ParseError {
                message: format!(
                    "Expected {:?}, got {:?} ({:?})",
                    token_type, tok.token_type, tok.value
                ),
                line: tok.line,
                column: tok.column,
            });
        }
        Ok(self.advance())
    }

    fn at_end(&self) -> bool {
        self.check(TokenType::Eof)
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenType::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while self.current().token_type.is_separator() {
            self.advance();
        }
    }

    fn loc(&self) -> SourceLocation {
        let tok = self.current();
        SourceLocation::new(tok.line, tok.column)
    }

    fn error_here(&self, message: String) -> ParseError {
        let tok = self.current();
        ParseError {
            message,
            line: tok.line,
            column: tok.column,
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        loc: left.loc(),
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn parse_number(tok: &Token, digits: &str) -> Result<f64, ParseError> {
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(ParseError {
            message: format!("Number literal out of range: {}", tok.value),
            line: tok.line,
            column: tok.column,
        }),
        Err(_) => Err(ParseError {
            message: format!("Invalid number literal: {}", tok.value),
            line: tok.line,
            column: tok.column,
        }),
    }
}

fn split_weight_literal(tok: &Token) -> Result<(&str, Unit), ParseError> {
    for unit in [Unit::Lb, Unit::Kg] {
        if let Some(digits) = tok.value.strip_suffix(unit.suffix()) {
            return Ok((digits, unit));
        }
    }
    Err(ParseError {
        message: format!("Invalid weight literal: {}", tok.value),
        line: tok.line,
        column: tok.column,
    })
}
