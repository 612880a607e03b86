//! Compiling script text into an AST, and a cache of compiled scripts keyed
//! by the SHA-256 of their source.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::ast::Statement;
use crate::lexer::{Lexer, LexerError};
use crate::parser::{ParseError, Parser};
use crate::runtime::ErrorKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Syntax Error at {0}")]
    Lex(#[from] LexerError),
    #[error("Syntax Error at {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Syntax
    }

    pub fn message(&self) -> &str {
        match self {
            CompileError::Lex(e) => &e.message,
            CompileError::Parse(e) => &e.message,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            CompileError::Lex(e) => e.line,
            CompileError::Parse(e) => e.line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            CompileError::Lex(e) => e.column,
            CompileError::Parse(e) => e.column,
        }
    }
}

/// A successfully parsed finish-day script. Only ever constructed from
/// source that lexed and parsed cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    source: String,
    fingerprint: String,
    statements: Vec<Statement>,
}

impl Script {
    pub fn compile(source: &str) -> Result<Script, CompileError> {
        let tokens = Lexer::new(source).tokenize()?;
        let statements = Parser::new(tokens).parse()?;
        Ok(Script {
            source: source.to_string(),
            fingerprint: fingerprint(source),
            statements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

pub fn fingerprint(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compiled scripts keyed by source fingerprint. Failed compilations are
/// never stored, so a broken script is re-reported on every lookup.
#[derive(Debug, Default)]
pub struct ScriptCache {
    entries: HashMap<String, Arc<Script>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&mut self, source: &str) -> Result<Arc<Script>, CompileError> {
        let key = fingerprint(source);
        if let Some(script) = self.entries.get(&key) {
            debug!(fingerprint = %&key[..12], "script cache hit");
            return Ok(Arc::clone(script));
        }
        let script = Arc::new(Script::compile(source)?);
        debug!(fingerprint = %&key[..12], statements = script.statements().len(), "compiled script");
        self.entries.insert(key, Arc::clone(&script));
        Ok(script)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(&fingerprint(source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
