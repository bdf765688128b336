use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

pub use qs_core::{
    fields_from_dynamic, fields_to_dynamic, CompileError, CompileErrorGroup, CompileFailure,
    ConversionError, DynArray, DynEntry, DynamicValue, EnvironmentCloneError, FromDynamic,
    HostFields, RuntimeFault, ServiceError, SourceTag, ToDynamic,
};
pub use qs_runtime::{
    compile, compile_at, compile_procedure, compile_procedure_at, compile_procedures,
    register_auto_includes, CompiledUnit, CompletionCallback, DefaultServiceProvider,
    EngineServices, Environment, EnvironmentFactory, ExecHandle, ExecutorIdentity, Procedure,
    ProcedureDecl, RunState, Script, ServiceProvider, WorkerPool,
};

/// Either phase of a one-shot evaluation can fail.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error(transparent)]
    Compile(#[from] CompileFailure),
    #[error(transparent)]
    Runtime(#[from] RuntimeFault),
}

/// Embedding entry point: owns the environment factory and hands out
/// compiled scripts bound to root-derived environments.
pub struct ScriptHost {
    factory: EnvironmentFactory,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self {
            factory: EnvironmentFactory::with_default_services(),
        }
    }

    pub fn with_provider(provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            factory: EnvironmentFactory::new(provider),
        }
    }

    pub fn factory(&self) -> &EnvironmentFactory {
        &self.factory
    }

    pub fn compile(&self, source: &str) -> Result<Script, CompileFailure> {
        self.compile_at(source, SourceTag::unknown())
    }

    pub fn compile_at(&self, source: &str, tag: SourceTag) -> Result<Script, CompileFailure> {
        let unit = compile_at(source, tag)?;
        Ok(Script::new(unit, self.factory.create_root()))
    }

    /// Compiles and runs one source string against a fresh environment.
    pub fn eval(&self, source: &str) -> Result<DynamicValue, EvalError> {
        Ok(self.compile(source)?.execute()?)
    }

    /// Like [`ScriptHost::eval`], with variables merged in and the
    /// executor identity set before the run.
    pub fn eval_with(
        &self,
        source: &str,
        vars: &BTreeMap<String, DynamicValue>,
        executor: Option<ExecutorIdentity>,
    ) -> Result<DynamicValue, EvalError> {
        let script = self.compile(source)?;
        for (name, value) in vars {
            script.environment().set_variable(name, value.clone());
        }
        if let Some(executor) = executor {
            script.environment().set_executor(Some(executor));
        }
        Ok(script.execute()?)
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}
