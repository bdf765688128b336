use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use qs_core::{DynamicValue, EnvironmentCloneError, SourceTag};

use crate::compile::Procedure;
use crate::services::EngineServices;

pub const VAR_SIGIL: char = '@';

/// Prepends the sigil when absent so lookups are prefix-insensitive
/// from the caller's side.
pub(crate) fn normalize_name(name: &str) -> String {
    if name.starts_with(VAR_SIGIL) {
        name.to_string()
    } else {
        format!("{VAR_SIGIL}{name}")
    }
}

/// One stored variable. Stored names always carry the sigil.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub value: DynamicValue,
    pub tag: SourceTag,
}

impl Variable {
    /// Variables are dynamically typed; no other declared type exists.
    pub const DECLARED_TYPE: &'static str = "auto";
}

/// Identity of whoever invoked a script. Opaque: equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutorIdentity(String);

impl ExecutorIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct EnvState {
    variables: BTreeMap<String, Variable>,
    procedures: BTreeMap<String, Procedure>,
    executor: Option<ExecutorIdentity>,
}

/// The execution context scripts run against: variable table, procedure
/// registry, and executor identity behind one shared lock.
///
/// Handles produced by [`Environment::share`] alias the same tables;
/// [`Environment::try_clone`] produces independent ones. There is no
/// implicit cloning anywhere.
#[derive(Debug)]
pub struct Environment {
    inner: Arc<Mutex<EnvState>>,
    services: Arc<EngineServices>,
}

impl Environment {
    pub fn new() -> Self {
        Self::with_services(Arc::new(EngineServices::default()))
    }

    pub fn with_services(services: Arc<EngineServices>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EnvState::default())),
            services,
        }
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        &self.services
    }

    fn lock(&self) -> MutexGuard<'_, EnvState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_variable(&self, name: &str, value: DynamicValue) {
        self.set_variable_at(name, value, SourceTag::unknown());
    }

    pub fn set_variable_at(&self, name: &str, value: DynamicValue, tag: SourceTag) {
        let name = normalize_name(name);
        let mut state = self.lock();
        state
            .variables
            .insert(name.clone(), Variable { name, value, tag });
    }

    /// Total: names never stored read as [`DynamicValue::Null`].
    pub fn get_variable(&self, name: &str) -> DynamicValue {
        let name = normalize_name(name);
        self.lock()
            .variables
            .get(&name)
            .map(|variable| variable.value.clone())
            .unwrap_or(DynamicValue::Null)
    }

    /// Snapshot of the variable table under normalized names.
    pub fn variables(&self) -> BTreeMap<String, DynamicValue> {
        self.lock()
            .variables
            .iter()
            .map(|(name, variable)| (name.clone(), variable.value.clone()))
            .collect()
    }

    /// Destructive union: names in `other` win, names only here survive.
    pub fn merge_variables(&self, other: &Environment) {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        let imported: Vec<Variable> = other.lock().variables.values().cloned().collect();
        let mut state = self.lock();
        for variable in imported {
            state.variables.insert(variable.name.clone(), variable);
        }
    }

    pub fn clear_variables(&self) {
        self.lock().variables.clear();
    }

    /// Registry insert; an existing name is overwritten.
    pub fn include_procedure(&self, procedure: Procedure) {
        self.lock()
            .procedures
            .insert(procedure.name().to_string(), procedure);
    }

    /// Registers under an explicit name, which may differ from the
    /// procedure's own.
    pub fn include_procedure_as(&self, name: &str, procedure: Procedure) {
        self.lock().procedures.insert(name.to_string(), procedure);
    }

    pub fn include_procedures<I>(&self, procedures: I)
    where
        I: IntoIterator<Item = Procedure>,
    {
        let mut state = self.lock();
        for procedure in procedures {
            state
                .procedures
                .insert(procedure.name().to_string(), procedure);
        }
    }

    /// Bulk registry insert keyed by the map's names.
    pub fn include_procedure_map(&self, procedures: BTreeMap<String, Procedure>) {
        let mut state = self.lock();
        for (name, procedure) in procedures {
            state.procedures.insert(name, procedure);
        }
    }

    pub fn procedure(&self, name: &str) -> Option<Procedure> {
        self.lock().procedures.get(name).cloned()
    }

    /// Snapshot of the procedure registry.
    pub fn procedures(&self) -> BTreeMap<String, Procedure> {
        self.lock().procedures.clone()
    }

    pub fn set_executor(&self, identity: Option<ExecutorIdentity>) {
        self.lock().executor = identity;
    }

    pub fn executor(&self) -> Option<ExecutorIdentity> {
        self.lock().executor.clone()
    }

    /// Independent variable and procedure tables, same executor identity
    /// and service set.
    pub fn try_clone(&self) -> Result<Environment, EnvironmentCloneError> {
        if self.inner.is_poisoned() {
            return Err(EnvironmentCloneError::new("environment lock is poisoned"));
        }
        let state = self.lock();
        Ok(Self {
            inner: Arc::new(Mutex::new(EnvState {
                variables: state.variables.clone(),
                procedures: state.procedures.clone(),
                executor: state.executor.clone(),
            })),
            services: Arc::clone(&self.services),
        })
    }

    /// Explicit aliasing: the returned handle mutates the same tables.
    pub fn share(&self) -> Environment {
        Self {
            inner: Arc::clone(&self.inner),
            services: Arc::clone(&self.services),
        }
    }

    pub fn is_alias_of(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
