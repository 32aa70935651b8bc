use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_recursion::async_recursion;
use dashmap::DashMap;
use tracing::{debug, info};

use super::{LoadError, ModuleLoader, ScriptModule};
use crate::analyzer::parsers::program::parse_source;
use crate::ast::{self, Item};
use crate::broadcast::{COORDINATOR, broadcast_bytes};
use crate::eval::{
    ControlFlow, EvalError, EvalResult, ExecutionContext, ModuleRef, StatementEvaluator,
    StatementResult, Value,
};
use crate::registry::NativeModule;

const SOURCE_OK: u8 = 1;
const SOURCE_ERR: u8 = 0;

/// One active driver function call; the depth drops again when it ends,
/// whether it returned, failed or was cancelled.
struct CallFrame<'a>(&'a AtomicUsize);

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cheap-to-clone handle on one embedded runtime instance.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

struct Inner {
    loader: ModuleLoader,
    native: Arc<NativeModule>,
    args: Vec<String>,
    broadcast_imports: bool,
    max_call_depth: usize,
    call_depth: AtomicUsize,
    modules: DashMap<String, Arc<ScriptModule>>,
    loading: DashMap<String, ()>,
    statements: StatementEvaluator,
    anonymous: AtomicUsize,
}

impl Interpreter {
    pub fn new(
        loader: ModuleLoader,
        native: NativeModule,
        args: Vec<String>,
        broadcast_imports: bool,
        max_call_depth: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                native: Arc::new(native),
                args,
                broadcast_imports,
                max_call_depth,
                call_depth: AtomicUsize::new(0),
                modules: DashMap::new(),
                loading: DashMap::new(),
                statements: StatementEvaluator::default(),
                anonymous: AtomicUsize::new(0),
            }),
        }
    }

    pub fn native(&self) -> &Arc<NativeModule> {
        &self.inner.native
    }

    pub fn args(&self) -> &[String] {
        &self.inner.args
    }

    /// Imports a module by name. Script modules are loaded and their body run
    /// once; later imports return the cached module.
    #[async_recursion]
    pub async fn import(&self, name: &str) -> Result<ModuleRef, LoadError> {
        if name == self.inner.native.name() {
            return Ok(ModuleRef::Native(self.inner.native.clone()));
        }
        if let Some(module) = self.inner.modules.get(name).map(|m| m.clone()) {
            return Ok(ModuleRef::Script(module));
        }
        if self.inner.loading.insert(name.to_string(), ()).is_some() {
            return Err(LoadError::Circular(name.to_string()));
        }

        let result = self.load(name).await;
        self.inner.loading.remove(name);
        let module = result?;
        self.inner.modules.insert(name.to_string(), module.clone());
        info!(module = name, "module imported");
        Ok(ModuleRef::Script(module))
    }

    async fn load(&self, name: &str) -> Result<Arc<ScriptModule>, LoadError> {
        let source = self.fetch_source(name).await?;
        let program = parse_source(&source).map_err(|source| LoadError::Syntax {
            module: name.to_string(),
            source,
        })?;
        self.instantiate(name, &program).await
    }

    /// Reads a module's source. With broadcast imports in a multi-rank
    /// world only the coordinator touches the filesystem; the outcome,
    /// success or failure, reaches every rank through one broadcast.
    async fn fetch_source(&self, name: &str) -> Result<String, LoadError> {
        let comm = self.inner.native.communicator();
        if !self.inner.broadcast_imports || comm.size() < 2 {
            return Ok(self.inner.loader.read(name).await?.1);
        }

        let local = if comm.rank() == COORDINATOR {
            Some(self.inner.loader.read(name).await)
        } else {
            None
        };
        let payload = match &local {
            Some(Ok((_, source))) => Some([&[SOURCE_OK][..], source.as_bytes()].concat()),
            Some(Err(e)) => Some([&[SOURCE_ERR][..], e.to_string().as_bytes()].concat()),
            None => None,
        };
        let received = broadcast_bytes(comm.as_ref(), payload.as_deref(), COORDINATOR).await?;
        if let Some(Err(e)) = local {
            return Err(e);
        }
        debug!(module = name, bytes = received.len(), "module source received");

        match received.split_first() {
            Some((&SOURCE_OK, source)) => String::from_utf8(source.to_vec())
                .map_err(|_| LoadError::Utf8(PathBuf::from(name))),
            Some((_, message)) => Err(LoadError::Coordinator {
                module: name.to_string(),
                message: String::from_utf8_lossy(message).into_owned(),
            }),
            None => Err(LoadError::Coordinator {
                module: name.to_string(),
                message: "empty payload".to_string(),
            }),
        }
    }

    /// Registers the program's functions, then runs its items in order.
    async fn instantiate(
        &self,
        name: &str,
        program: &ast::Program,
    ) -> Result<Arc<ScriptModule>, LoadError> {
        let module = Arc::new(ScriptModule::new(name, program));
        let context = Arc::new(ExecutionContext::module_body(self.clone(), module.clone()));

        for item in &program.items {
            match item {
                Item::Import(import) => {
                    let imported = self.import(import).await?;
                    module.set_global(import, Value::Module(imported));
                }
                Item::Function(_) => {}
                Item::Statement(statement) => {
                    let result = self
                        .inner
                        .statements
                        .eval_statement(statement, context.clone())
                        .await
                        .map_err(|e| LoadError::Body {
                            module: name.to_string(),
                            source: Box::new(e),
                        })?;
                    if let StatementResult::Control(ControlFlow::Return(_)) = result {
                        break;
                    }
                }
            }
        }
        Ok(module)
    }

    fn enter_call(&self, name: &str) -> EvalResult<CallFrame<'_>> {
        let depth = self.inner.call_depth.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = CallFrame(&self.inner.call_depth);
        if depth > self.inner.max_call_depth {
            return Err(EvalError::RecursionLimit {
                function: name.to_string(),
                limit: self.inner.max_call_depth,
            });
        }
        Ok(frame)
    }

    #[async_recursion]
    pub async fn call_function(
        &self,
        module: Arc<ScriptModule>,
        name: &str,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let _frame = self.enter_call(name)?;
        let function = module
            .function(name)
            .ok_or_else(|| EvalError::UndefinedFunction(format!("{}.{}", module.name(), name)))?;
        if function.params.len() != args.len() {
            return Err(EvalError::Arity {
                name: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }

        let bindings = function.params.iter().cloned().zip(args);
        let context = Arc::new(ExecutionContext::function_call(
            self.clone(),
            module,
            bindings,
        ));
        match self
            .inner
            .statements
            .eval_block(&function.body, context)
            .await?
        {
            StatementResult::Control(ControlFlow::Return(value)) => Ok(value),
            StatementResult::Value(_) => Ok(Value::Null),
        }
    }

    /// Compiles `source` as an anonymous module and calls its `main`, if it
    /// defines one.
    pub async fn exec_source(&self, source: &str) -> EvalResult<Value> {
        let id = self.inner.anonymous.fetch_add(1, Ordering::Relaxed);
        let name = format!("<exec-{}>", id);
        let program = parse_source(source).map_err(|source| LoadError::Syntax {
            module: name.clone(),
            source,
        })?;
        let module = self.instantiate(&name, &program).await?;
        if module.function("main").is_some() {
            self.call_function(module, "main", vec![]).await
        } else {
            Ok(Value::Null)
        }
    }
}
