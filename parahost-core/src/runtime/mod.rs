//! # Embedded Runtime
//!
//! Module loading and the interpreter that drives evaluation. A driver
//! program is a set of `.phs` modules found on the configured search
//! paths, plus the native module built from the registry.

mod interpreter;
mod loader;

pub use interpreter::Interpreter;
pub use loader::ModuleLoader;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::analyzer::parsers::program::SyntaxError;
use crate::ast::{self, FunctionDef};
use crate::broadcast::BroadcastError;
use crate::eval::{EvalError, Value};

/// A loaded script module: its functions and its global variables.
pub struct ScriptModule {
    name: String,
    functions: HashMap<String, Arc<FunctionDef>>,
    globals: DashMap<String, Value>,
}

impl ScriptModule {
    pub fn new(name: impl Into<String>, program: &ast::Program) -> Self {
        Self {
            name: name.into(),
            functions: program
                .functions()
                .map(|def| (def.name.clone(), Arc::new(def.clone())))
                .collect(),
            globals: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).map(|value| value.clone())
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no module named {module} (searched {searched:?})")]
    NotFound {
        module: String,
        searched: Vec<PathBuf>,
    },
    #[error("{path}: {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        path: PathBuf,
        size: u64,
        limit: usize,
    },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: source is not valid UTF-8")]
    Utf8(PathBuf),
    #[error("syntax error in {module}: {source}")]
    Syntax {
        module: String,
        #[source]
        source: SyntaxError,
    },
    #[error("circular import of {0}")]
    Circular(String),
    #[error("error while importing {module}: {source}")]
    Body {
        module: String,
        #[source]
        source: Box<EvalError>,
    },
    /// Load failed on the coordinator; other ranks only see its message.
    #[error("coordinator failed to load {module}: {message}")]
    Coordinator { module: String, message: String },
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}
