pub mod lexer;
pub mod ast;
pub mod parser;
pub mod script;
pub mod runtime;
pub mod trace;
pub mod simulate;
pub mod program;
