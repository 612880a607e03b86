//! Parser tests: statements, targets, expressions, syntax errors

use liftscript::ast::*;
use liftscript::lexer::Lexer;
use liftscript::parser::Parser;
use liftscript::runtime::value::Unit;
use liftscript::runtime::ErrorKind;
use liftscript::script::{fingerprint, Script, ScriptCache};

fn parse(source: &str) -> Vec<Statement> {
    let tokens = Lexer::new(source).tokenize().unwrap();
    Parser::new(tokens).parse().unwrap()
}

fn parse_err(source: &str) -> String {
    let tokens = Lexer::new(source).tokenize().unwrap();
    Parser::new(tokens).parse().unwrap_err().to_string()
}

fn single_assignment(source: &str) -> (Target, AssignOp, Expr) {
    let stmts = parse(source);
    assert_eq!(stmts.len(), 1);
    match stmts.into_iter().next().unwrap() {
        Statement::Assignment { target, op, value, .. } => (target, op, value),
        other => panic!("expected assignment, got {:?}", other),
    }
}

fn expr(source: &str) -> Expr {
    single_assignment(&format!("x = {}", source)).2
}

// ── Statements ──────────────────────────────────────────────

#[test]
fn empty_script() {
    assert!(parse("").is_empty());
    assert!(parse("\n\n// only a comment\n").is_empty());
}

#[test]
fn statements_separated_by_newline_and_semicolon() {
    assert_eq!(parse("a = 1\nb = 2; c = 3").len(), 3);
}

#[test]
fn missing_separator_is_an_error() {
    assert!(parse_err("a = 1 b = 2").contains("Expected ';' or newline"));
}

#[test]
fn compound_operators() {
    for (src, expected) in [
        ("x = 1", AssignOp::Assign),
        ("x += 1", AssignOp::Add),
        ("x -= 1", AssignOp::Subtract),
        ("x *= 1", AssignOp::Multiply),
        ("x /= 1", AssignOp::Divide),
    ] {
        assert_eq!(single_assignment(src).1, expected);
    }
}

#[test]
fn if_else_chain() {
    let stmts = parse("if (a) { x = 1 } else if (b) { x = 2 } else { x = 3 }");
    match &stmts[0] {
        Statement::If { then_body, else_body, .. } => {
            assert_eq!(then_body.len(), 1);
            assert_eq!(else_body.len(), 1);
            match &else_body[0] {
                Statement::If { else_body, .. } => assert_eq!(else_body.len(), 1),
                other => panic!("expected nested if, got {:?}", other),
            }
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn else_on_following_line() {
    let stmts = parse("if (a) {\n  x = 1\n}\nelse {\n  x = 2\n}\n");
    assert_eq!(stmts.len(), 1);
    match &stmts[0] {
        Statement::If { else_body, .. } => assert_eq!(else_body.len(), 1),
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn if_without_else_followed_by_statement() {
    let stmts = parse("if (a) { x = 1 }\ny = 2");
    assert_eq!(stmts.len(), 2);
}

#[test]
fn for_loop() {
    let stmts = parse("for (r in completedReps) { total += r }");
    match &stmts[0] {
        Statement::For { var, body, .. } => {
            assert_eq!(var, "r");
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected for, got {:?}", other),
    }
}

#[test]
fn loop_variable_is_read_only() {
    assert!(parse_err("for (r in reps) { r = 1 }").contains("Cannot assign to loop variable 'r'"));
}

#[test]
fn loop_variable_scope_ends_with_loop() {
    assert_eq!(parse("for (r in reps) { t += r }\nr = 1").len(), 2);
}

// ── Targets ─────────────────────────────────────────────────

#[test]
fn bare_target() {
    let (target, _, _) = single_assignment("weight = 100lb");
    assert_eq!(target.name, "weight");
    assert!(!target.qualified);
    assert!(target.path.is_empty());
}

#[test]
fn state_qualified_target() {
    let (target, _, _) = single_assignment("state.weight += 5lb");
    assert_eq!(target.name, "weight");
    assert!(target.qualified);
}

#[test]
fn wildcard_target_path() {
    let (target, _, _) = single_assignment("weights[1:*] += 5lb");
    assert_eq!(target.path.len(), 2);
    assert!(matches!(target.path[0], PathComponent::Index(Expr::Number { value, .. }) if value == 1.0));
    assert_eq!(target.path[1], PathComponent::Wildcard);
}

#[test]
fn chained_brackets_equal_colon_path() {
    let (a, _, _) = single_assignment("w[1][*] = 1");
    let (b, _, _) = single_assignment("w[1:*] = 1");
    assert_eq!(a.path, b.path);
}

#[test]
fn wildcard_outside_target_is_an_error() {
    assert!(parse_err("x = weights[*]").contains("Wildcard"));
}

#[test]
fn assignment_requires_operator() {
    assert!(parse_err("x 5").contains("Expected assignment operator"));
}

// ── Expressions ─────────────────────────────────────────────

#[test]
fn weight_literal() {
    match expr("2.5kg") {
        Expr::Weight { value, unit, .. } => {
            assert_eq!(value, 2.5);
            assert_eq!(unit, Unit::Kg);
        }
        other => panic!("expected weight, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    match expr("1 + 2 * 3") {
        Expr::Binary { op: BinaryOp::Add, right, .. } => {
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("expected addition, got {:?}", other),
    }
}

#[test]
fn and_binds_tighter_than_or() {
    match expr("a || b && c") {
        Expr::Binary { op: BinaryOp::Or, right, .. } => {
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
        }
        other => panic!("expected or, got {:?}", other),
    }
}

#[test]
fn word_operators() {
    assert!(matches!(expr("a and b"), Expr::Binary { op: BinaryOp::And, .. }));
    assert!(matches!(expr("a or b"), Expr::Binary { op: BinaryOp::Or, .. }));
    assert!(matches!(expr("not a"), Expr::Unary { op: UnaryOp::Not, .. }));
}

#[test]
fn ternary_is_loosest() {
    match expr("a > 1 ? 5lb : 0lb") {
        Expr::Ternary { condition, .. } => {
            assert!(matches!(*condition, Expr::Binary { op: BinaryOp::Gt, .. }));
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

#[test]
fn parenthesised_grouping() {
    assert!(matches!(expr("(1 + 2) * 3"), Expr::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn unary_minus() {
    assert!(matches!(expr("-5lb"), Expr::Unary { op: UnaryOp::Neg, .. }));
}

#[test]
fn function_call_arguments() {
    match expr("calculate1RM(weights[1], completedReps[1])") {
        Expr::Call { name, arguments, .. } => {
            assert_eq!(name, "calculate1RM");
            assert_eq!(arguments.len(), 2);
            assert!(matches!(arguments[0], Expr::Index { .. }));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn state_variable_read() {
    assert!(matches!(expr("state.reps"), Expr::StateVar { ref name, .. } if name == "reps"));
}

#[test]
fn multi_component_index_nests() {
    match expr("grid[1:2]") {
        Expr::Index { object, .. } => assert!(matches!(*object, Expr::Index { .. })),
        other => panic!("expected index, got {:?}", other),
    }
}

// ── Errors ──────────────────────────────────────────────────

#[test]
fn unclosed_block() {
    assert!(parse_err("if (a) { x = 1").contains("Expected RBrace"));
}

#[test]
fn if_requires_parentheses() {
    assert!(parse_err("if a { x = 1 }").contains("Expected LParen"));
}

#[test]
fn statement_must_start_with_target() {
    assert!(parse_err("5 = x").contains("Expected assignment, 'if' or 'for'"));
}

#[test]
fn error_carries_position() {
    let err = parse_err("x = 1\ny = )");
    assert!(err.starts_with("2:5:"), "got {}", err);
}

#[test]
fn nesting_depth_is_limited() {
    let src = format!("x = {}1{}", "(".repeat(200), ")".repeat(200));
    assert!(parse_err(&src).contains("Maximum nesting depth"));
}

#[test]
fn moderate_nesting_parses() {
    let src = format!("x = {}1{}", "(".repeat(30), ")".repeat(30));
    assert_eq!(parse(&src).len(), 1);
}

#[test]
fn long_operator_chain_is_limited() {
    let src = format!("x = {}1", "1+".repeat(20_000));
    let err = parse_err(&src);
    assert!(err.contains("Maximum nesting depth"), "got {}", err);
    assert!(err.starts_with("1:"), "got {}", err);
}

#[test]
fn long_comparison_and_logic_chains_are_limited() {
    assert!(parse_err(&format!("x = {}a", "a < ".repeat(500))).contains("Maximum nesting depth"));
    assert!(parse_err(&format!("x = {}a", "a || ".repeat(500))).contains("Maximum nesting depth"));
}

#[test]
fn long_index_chain_is_limited() {
    let src = format!("x = grid{}", "[1]".repeat(500));
    assert!(parse_err(&src).contains("Maximum nesting depth"));
}

#[test]
fn deeply_nested_blocks_are_limited() {
    let src = format!("{}x = 1{}", "if (a) { ".repeat(200), " }".repeat(200));
    assert!(parse_err(&src).contains("Maximum nesting depth"));
}

#[test]
fn chain_depth_resets_between_statements() {
    let line = format!("x = {}1\n", "1 + ".repeat(40));
    assert_eq!(parse(&line.repeat(10)).len(), 10);
}

#[test]
fn number_literal_out_of_range() {
    let src = format!("x = {}", "9".repeat(400));
    assert!(parse_err(&src).contains("Number literal out of range"));
    let weight = format!("x = {}lb", "9".repeat(400));
    assert!(parse_err(&weight).contains("Number literal out of range"));
}

#[test]
fn locations_are_recorded() {
    let stmts = parse("\n  x = 1");
    assert_eq!(stmts[0].loc(), SourceLocation::new(2, 3));
}

// ── Compilation and cache ───────────────────────────────────

#[test]
fn compiled_script_keeps_source_and_fingerprint() {
    let script = Script::compile("x += 1").unwrap();
    assert_eq!(script.source(), "x += 1");
    assert_eq!(script.fingerprint(), fingerprint("x += 1"));
    assert_eq!(script.fingerprint().len(), 64);
    assert_eq!(script.statements().len(), 1);
}

#[test]
fn compile_error_is_a_syntax_error() {
    let err = Script::compile("x = = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!((err.line(), err.column()), (1, 5));
    assert!(err.to_string().starts_with("Syntax Error at 1:5"));

    let lex_err = Script::compile("x = 1 $").unwrap_err();
    assert!(lex_err.message().contains("Unexpected character"));
}

#[test]
fn cache_reuses_compiled_script() {
    let mut cache = ScriptCache::new();
    let a = cache.get_or_compile("weight += 5lb").unwrap();
    let b = cache.get_or_compile("weight += 5lb").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_never_stores_broken_scripts() {
    let mut cache = ScriptCache::new();
    assert!(cache.get_or_compile("if (").is_err());
    assert!(cache.get_or_compile("if (").is_err());
    assert!(cache.is_empty());
    assert!(!cache.contains("if ("));
}
