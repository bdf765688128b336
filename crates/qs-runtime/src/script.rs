use std::sync::{Arc, Mutex, PoisonError};

use qs_core::{DynamicValue, RuntimeFault, SourceTag};

use crate::auto_include::register_auto_includes;
use crate::compile::CompiledUnit;
use crate::engine::run_unit;
use crate::environment::{Environment, ExecutorIdentity};
use crate::pool::{default_pool, ExecHandle, WorkerPool};

/// Runs once an execution reaches a terminal state, with the run's
/// outcome. For asynchronous runs it executes on the worker, so it must
/// be safe to invoke concurrently with the submitting thread.
pub type CompletionCallback = Box<dyn FnOnce(Result<&DynamicValue, &RuntimeFault>) + Send>;

/// Lifecycle of a single run: `Compiled → Running → {Completed, Failed}`.
/// Terminal states are only left by starting a new run; there is no
/// cancellation once `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Compiled,
    Running,
    Completed,
    Failed,
}

/// Binds a compiled unit to its environment and drives execution.
pub struct Script {
    unit: Arc<CompiledUnit>,
    env: Environment,
    persist: bool,
    state: Arc<Mutex<RunState>>,
}

impl Script {
    pub fn new(unit: CompiledUnit, env: Environment) -> Self {
        Self {
            unit: Arc::new(unit),
            env,
            persist: true,
            state: Arc::new(Mutex::new(RunState::Compiled)),
        }
    }

    /// When false, each run works on an isolated clone of the owned
    /// environment and its variable/procedure changes are discarded
    /// afterwards.
    pub fn set_persist(&mut self, persist: bool) {
        self.persist = persist;
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    pub fn tag(&self) -> &SourceTag {
        self.unit.tag()
    }

    /// State of the most recent run.
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execute(&self) -> Result<DynamicValue, RuntimeFault> {
        self.execute_with(None)
    }

    /// Sets the executor identity on the owned environment, then runs.
    pub fn execute_as(&self, executor: ExecutorIdentity) -> Result<DynamicValue, RuntimeFault> {
        self.env.set_executor(Some(executor));
        self.execute_with(None)
    }

    pub fn execute_with(
        &self,
        callback: Option<CompletionCallback>,
    ) -> Result<DynamicValue, RuntimeFault> {
        run_once(self.run_context(), callback)
    }

    /// Runs against a supplied environment instead of the owned one; the
    /// persist flag does not apply and mutations land in `env`.
    pub fn execute_in(
        &self,
        env: &Environment,
        callback: Option<CompletionCallback>,
    ) -> Result<DynamicValue, RuntimeFault> {
        run_once(
            RunContext {
                unit: Arc::clone(&self.unit),
                env: env.share(),
                persist: true,
                state: Arc::clone(&self.state),
            },
            callback,
        )
    }

    /// Submits the run to the crate's default pool. Faults surface only
    /// through the callback or the returned handle.
    pub fn execute_async(&self, callback: Option<CompletionCallback>) -> ExecHandle {
        self.execute_async_on(default_pool(), callback)
    }

    pub fn execute_async_on(
        &self,
        pool: &WorkerPool,
        callback: Option<CompletionCallback>,
    ) -> ExecHandle {
        pool.submit_run(self.run_context(), callback)
    }

    fn run_context(&self) -> RunContext {
        RunContext {
            unit: Arc::clone(&self.unit),
            env: self.env.share(),
            persist: self.persist,
            state: Arc::clone(&self.state),
        }
    }
}

/// Everything one run needs, detached from the `Script` so workers can
/// own it.
pub(crate) struct RunContext {
    unit: Arc<CompiledUnit>,
    env: Environment,
    persist: bool,
    state: Arc<Mutex<RunState>>,
}

impl RunContext {
    pub(crate) fn state_handle(&self) -> Arc<Mutex<RunState>> {
        Arc::clone(&self.state)
    }
}

pub(crate) fn run_once(
    ctx: RunContext,
    callback: Option<CompletionCallback>,
) -> Result<DynamicValue, RuntimeFault> {
    set_state(&ctx.state, RunState::Running);

    let outcome = run_inner(&ctx);

    match &outcome {
        Ok(value) => {
            set_state(&ctx.state, RunState::Completed);
            if let Some(callback) = callback {
                callback(Ok(value));
            }
        }
        Err(fault) => {
            set_state(&ctx.state, RunState::Failed);
            if let Some(callback) = callback {
                callback(Err(fault));
            }
        }
    }

    outcome
}

fn run_inner(ctx: &RunContext) -> Result<DynamicValue, RuntimeFault> {
    // Persisted runs mutate the owned environment; isolated runs work on
    // an independent clone that is dropped afterwards. A failed clone is
    // a fault here, never a silent fallback to the shared tables.
    let chosen = if ctx.persist {
        ctx.env.share()
    } else {
        ctx.env.try_clone().map_err(|error| {
            RuntimeFault::new(
                format!("cannot isolate run: {error}"),
                ctx.unit.tag().clone(),
            )
        })?
    };

    register_auto_includes(&chosen);
    run_unit(&ctx.unit, &chosen)
}

fn set_state(state: &Mutex<RunState>, next: RunState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn script(source: &str) -> Script {
        Script::new(compile(source).expect("compile"), Environment::new())
    }

    #[test]
    fn execute_returns_the_final_expression_value() {
        let script = script("2 + 2");
        assert_eq!(script.state(), RunState::Compiled);
        assert_eq!(script.execute().expect("run"), DynamicValue::Int(4));
        assert_eq!(script.state(), RunState::Completed);
    }

    #[test]
    fn empty_scripts_evaluate_to_null() {
        assert_eq!(script("").execute().expect("run"), DynamicValue::Null);
    }

    #[test]
    fn persisted_runs_keep_script_variables() {
        let script = script("let total = 40 + 2; total");
        assert_eq!(script.execute().expect("run"), DynamicValue::Int(42));
        assert_eq!(
            script.environment().get_variable("total"),
            DynamicValue::Int(42)
        );
    }

    #[test]
    fn isolated_runs_discard_script_variables() {
        let mut script = script("let hidden = 99; 2 + 2");
        script.set_persist(false);

        assert_eq!(script.execute().expect("first run"), DynamicValue::Int(4));
        assert_eq!(script.execute().expect("second run"), DynamicValue::Int(4));
        assert_eq!(
            script.environment().get_variable("hidden"),
            DynamicValue::Null
        );
    }

    #[test]
    fn environment_variables_are_visible_to_the_run() {
        let script = script("x * 2");
        script.environment().set_variable("x", DynamicValue::Int(21));
        assert_eq!(script.execute().expect("run"), DynamicValue::Int(42));
    }

    #[test]
    fn later_runs_see_writes_from_earlier_persisted_runs() {
        let env = Environment::new();
        let first = Script::new(compile("let counter = 1; counter").expect("compile"), env.share());
        first.execute().expect("first");

        let second = Script::new(compile("counter + 1").expect("compile"), env);
        assert_eq!(second.execute().expect("second"), DynamicValue::Int(2));
    }

    #[test]
    fn faults_transition_to_failed_and_carry_a_message() {
        let script = script("undefined_name + 1");
        let fault = script.execute().expect_err("undefined variable");
        assert!(!fault.message.is_empty());
        assert_eq!(script.state(), RunState::Failed);
    }

    #[test]
    fn auto_included_procedures_are_always_callable() {
        assert_eq!(
            script("_min(3, 7)").execute().expect("run"),
            DynamicValue::Int(3)
        );
        assert_eq!(
            script("_clamp(12, 0, 10)").execute().expect("run"),
            DynamicValue::Int(10)
        );
        assert_eq!(
            script("_repeat(\"ab\", 3)").execute().expect("run"),
            DynamicValue::String("ababab".to_string())
        );
    }

    #[test]
    fn registered_procedures_are_callable_and_unit_definitions_win() {
        let script = script("_twice(21)");
        let procedure =
            crate::compile::compile_procedure("_twice", &["n"], "n * 2").expect("procedure");
        script.environment().include_procedure(procedure);
        assert_eq!(script.execute().expect("run"), DynamicValue::Int(42));

        let shadowing = Script::new(
            compile("fn _twice(n) { n * 10 }\n_twice(2)").expect("compile"),
            script.environment().try_clone().expect("clone"),
        );
        assert_eq!(shadowing.execute().expect("run"), DynamicValue::Int(20));
    }

    #[test]
    fn executor_identity_is_visible_inside_the_run() {
        let script = script("executor()");
        let value = script
            .execute_as(ExecutorIdentity::new("console"))
            .expect("run");
        assert_eq!(value, DynamicValue::String("console".to_string()));

        let bare = Script::new(compile("executor()").expect("compile"), Environment::new());
        assert_eq!(
            bare.execute().expect("run"),
            DynamicValue::String(String::new())
        );
    }

    #[test]
    fn completion_callback_observes_the_outcome() {
        let script = script("1 + 1");
        let called = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&called);
        let callback: CompletionCallback = Box::new(move |outcome| {
            assert_eq!(outcome.expect("success"), &DynamicValue::Int(2));
            observed.store(true, Ordering::SeqCst);
        });
        script.execute_with(Some(callback)).expect("run");
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn external_environments_receive_the_run_mutations() {
        let script = script("let external = 5; external");
        let other = Environment::new();
        assert_eq!(
            script.execute_in(&other, None).expect("run"),
            DynamicValue::Int(5)
        );
        assert_eq!(other.get_variable("external"), DynamicValue::Int(5));
        assert_eq!(
            script.environment().get_variable("external"),
            DynamicValue::Null
        );
    }

    #[test]
    fn async_execution_joins_to_the_same_result() {
        let script = script("6 * 7");
        let handle = script.execute_async(None);
        assert_eq!(handle.join().expect("join"), DynamicValue::Int(42));
        assert_eq!(script.state(), RunState::Completed);
    }

    #[test]
    fn async_faults_surface_only_through_the_handle() {
        let script = script("missing_name");
        let handle = script.execute_async(None);
        let fault = handle.join().expect_err("fault");
        assert!(!fault.message.is_empty());
    }
}
