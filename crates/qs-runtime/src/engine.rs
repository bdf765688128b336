use rhai::{Dynamic, Engine, Scope, AST};
use tracing::debug;

use qs_core::{DynamicValue, RuntimeFault, SourceTag};

use crate::compile::CompiledUnit;
use crate::environment::{Environment, VAR_SIGIL};
use crate::helpers::rhai_bridge::{dynamic_to_value, value_to_dynamic};

/// Evaluates a compiled unit against an environment.
///
/// The environment's procedure registry is merged into the unit, the
/// scope is populated from the variable table (sigil stripped), and
/// every scope binding left behind by the run is written back under its
/// normalized name.
pub(crate) fn run_unit(
    unit: &CompiledUnit,
    env: &Environment,
) -> Result<DynamicValue, RuntimeFault> {
    let tag = unit.tag().clone();

    let mut library: Option<AST> = None;
    for procedure in env.procedures().into_values() {
        library = Some(match library {
            None => procedure.unit().ast().clone(),
            Some(acc) => acc.merge(procedure.unit().ast()),
        });
    }
    // The unit merges last so its own definitions win over registry ones.
    let merged = match library {
        None => unit.ast().clone(),
        Some(acc) => acc.merge(unit.ast()),
    };

    let mut scope = Scope::new();
    for (name, value) in env.variables() {
        let plain = name.trim_start_matches(VAR_SIGIL).to_string();
        scope.push_dynamic(plain, value_to_dynamic(&value));
    }

    let mut engine = Engine::new();
    let executor_id = env
        .executor()
        .map(|identity| identity.id().to_string())
        .unwrap_or_default();
    engine.register_fn("executor", move || executor_id.clone());

    debug!(unit = %tag, "executing compiled unit");

    let result = engine
        .eval_ast_with_scope::<Dynamic>(&mut scope, &merged)
        .map_err(|error| fault_from_eval(&error, &tag))?;

    for (name, constant, value) in scope.iter() {
        if constant {
            continue;
        }
        let stored = dynamic_to_value(value, &tag)?;
        env.set_variable_at(name, stored, tag.clone());
    }

    dynamic_to_value(result, &tag)
}

fn fault_from_eval(error: &rhai::EvalAltResult, tag: &SourceTag) -> RuntimeFault {
    let line = error.position().line().unwrap_or(tag.line);
    RuntimeFault::new(error.to_string(), SourceTag::new(tag.source.clone(), line))
}
