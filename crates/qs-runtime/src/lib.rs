mod auto_include;
mod compile;
mod engine;
mod environment;
mod factory;
mod helpers;
mod pool;
mod script;
mod services;

pub use auto_include::{register_auto_includes, AUTO_INCLUDE_LIBRARY};
pub use compile::{
    compile, compile_at, compile_procedure, compile_procedure_at, compile_procedures, CompiledUnit,
    Procedure, ProcedureDecl,
};
pub use environment::{Environment, ExecutorIdentity, Variable, VAR_SIGIL};
pub use factory::EnvironmentFactory;
pub use pool::{ExecHandle, WorkerPool, DEFAULT_POOL_WORKERS};
pub use script::{CompletionCallback, RunState, Script};
pub use services::{
    DefaultServiceProvider, EngineServices, ExecutionQueue, PersistenceNetwork, ProfileSet,
    Profiler, ServiceProvider, TaskManager,
};
