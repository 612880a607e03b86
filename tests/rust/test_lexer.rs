//! Lexer tests: tokenization, weight literals, error handling

use liftscript::lexer::Lexer;
use liftscript::lexer::tokens::TokenType;

fn lex(source: &str) -> Vec<(TokenType, String)> {
    let tokens = Lexer::new(source).tokenize().unwrap();
    tokens.into_iter()
        .filter(|t| !matches!(t.token_type, TokenType::Eof))
        .map(|t| (t.token_type, t.value))
        .collect()
}

fn lex_types(source: &str) -> Vec<TokenType> {
    lex(source).into_iter().map(|(tt, _)| tt).collect()
}

fn lex_err(source: &str) -> String {
    Lexer::new(source).tokenize().unwrap_err().message
}

// ── Basic tokens ────────────────────────────────────────────

#[test]
fn identifier() {
    let tokens = lex("trainingMax");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0], (TokenType::Identifier, "trainingMax".into()));
}

#[test]
fn integer_literal() {
    assert_eq!(lex("42")[0], (TokenType::Integer, "42".into()));
}

#[test]
fn float_literal() {
    assert_eq!(lex("2.5")[0], (TokenType::Float, "2.5".into()));
}

#[test]
fn string_literal() {
    assert_eq!(lex("\"kg\"")[0], (TokenType::StringLit, "kg".into()));
}

#[test]
fn string_escape_sequences() {
    assert_eq!(lex(r#""a\"b""#)[0], (TokenType::StringLit, "a\"b".into()));
}

// ── Weight literals ─────────────────────────────────────────

#[test]
fn weight_literal_pounds() {
    assert_eq!(lex("5lb")[0], (TokenType::Weight, "5lb".into()));
}

#[test]
fn weight_literal_kilograms_with_decimal() {
    assert_eq!(lex("2.5kg")[0], (TokenType::Weight, "2.5kg".into()));
}

#[test]
fn weight_unit_must_be_glued() {
    assert_eq!(
        lex_types("5 lb"),
        vec![TokenType::Integer, TokenType::Identifier]
    );
}

#[test]
fn unknown_suffix_is_an_error() {
    assert!(lex_err("5lbs").contains("Invalid numeric literal"));
    assert!(lex_err("10x").contains("Invalid numeric literal"));
}

// ── Operators ───────────────────────────────────────────────

#[test]
fn assignment_operators() {
    assert_eq!(
        lex_types("= += -= *= /="),
        vec![
            TokenType::Assign,
            TokenType::PlusAssign,
            TokenType::MinusAssign,
            TokenType::StarAssign,
            TokenType::SlashAssign,
        ]
    );
}

#[test]
fn comparison_operators() {
    assert_eq!(
        lex_types("== != < <= > >="),
        vec![
            TokenType::Equals,
            TokenType::NotEquals,
            TokenType::LessThan,
            TokenType::LessEqual,
            TokenType::GreaterThan,
            TokenType::GreaterEqual,
        ]
    );
}

#[test]
fn boolean_operators() {
    assert_eq!(
        lex_types("&& || ! and or not"),
        vec![
            TokenType::AndAnd,
            TokenType::OrOr,
            TokenType::Bang,
            TokenType::And,
            TokenType::Or,
            TokenType::Not,
        ]
    );
}

#[test]
fn wildcard_path() {
    assert_eq!(
        lex_types("weights[1:*]"),
        vec![
            TokenType::Identifier,
            TokenType::LBracket,
            TokenType::Integer,
            TokenType::Colon,
            TokenType::Star,
            TokenType::RBracket,
        ]
    );
}

#[test]
fn ternary_tokens() {
    assert_eq!(
        lex_types("a ? 1 : 2"),
        vec![
            TokenType::Identifier,
            TokenType::Question,
            TokenType::Integer,
            TokenType::Colon,
            TokenType::Integer,
        ]
    );
}

// ── Keywords ────────────────────────────────────────────────

#[test]
fn keywords() {
    assert_eq!(
        lex_types("if else for in true false state"),
        vec![
            TokenType::If,
            TokenType::Else,
            TokenType::For,
            TokenType::In,
            TokenType::True,
            TokenType::False,
            TokenType::State,
        ]
    );
}

#[test]
fn keyword_prefix_is_identifier() {
    assert_eq!(lex("iffy")[0].0, TokenType::Identifier);
    assert_eq!(lex("states")[0].0, TokenType::Identifier);
}

#[test]
fn state_access() {
    assert_eq!(
        lex_types("state.reps"),
        vec![TokenType::State, TokenType::Dot, TokenType::Identifier]
    );
}

// ── Comments and separators ─────────────────────────────────

#[test]
fn line_comment_is_skipped() {
    assert_eq!(
        lex_types("x = 1 // bump\ny = 2"),
        vec![
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Integer,
            TokenType::Newline,
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Integer,
        ]
    );
}

#[test]
fn division_is_not_a_comment() {
    assert_eq!(
        lex_types("a / b"),
        vec![TokenType::Identifier, TokenType::Slash, TokenType::Identifier]
    );
}

#[test]
fn semicolons_and_newlines() {
    assert_eq!(
        lex_types("a = 1; b = 2\n"),
        vec![
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Integer,
            TokenType::Semicolon,
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Integer,
            TokenType::Newline,
        ]
    );
}

// ── Line numbers ────────────────────────────────────────────

#[test]
fn line_and_column_tracking() {
    let tokens = Lexer::new("a = 1\n  b = 2").tokenize().unwrap();
    let b = tokens.iter().find(|t| t.value == "b").unwrap();
    assert_eq!((b.line, b.column), (2, 3));
}

// ── Errors ──────────────────────────────────────────────────

#[test]
fn unexpected_character() {
    assert!(lex_err("x = 1 @ 2").contains("Unexpected character"));
}

#[test]
fn unterminated_string() {
    assert!(lex_err("convert(w, \"kg").contains("Unterminated string"));
}

#[test]
fn error_reports_position() {
    let err = Lexer::new("x = 1\ny = #").tokenize().unwrap_err();
    assert_eq!((err.line, err.column), (2, 5));
}

// ── Full script ─────────────────────────────────────────────

#[test]
fn full_script_ends_with_eof() {
    let src = "if (completedReps >= reps) {\n  state.weight += 5lb\n}\n";
    let tokens = Lexer::new(src).tokenize().unwrap();
    assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    assert!(tokens.iter().any(|t| t.token_type == TokenType::Weight));
}
