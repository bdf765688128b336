use std::sync::OnceLock;

use qs_core::SourceTag;

use crate::compile::{compile_procedures, Procedure, ProcedureDecl};
use crate::environment::Environment;

/// The implicit library injected into every chosen environment right
/// before a unit runs, whether or not the run persists its changes.
/// Entries are `(name, params, body)`.
pub const AUTO_INCLUDE_LIBRARY: &[(&str, &[&str], &str)] = &[
    ("_min", &["a", "b"], "if a < b { a } else { b }"),
    ("_max", &["a", "b"], "if a > b { a } else { b }"),
    (
        "_clamp",
        &["value", "low", "high"],
        "if value < low { low } else if value > high { high } else { value }",
    ),
    (
        "_repeat",
        &["text", "count"],
        "let out = \"\"; for i in 0..count { out += text; } out",
    ),
];

fn auto_include_procedures() -> &'static [Procedure] {
    static LIBRARY: OnceLock<Vec<Procedure>> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let decls: Vec<ProcedureDecl> = AUTO_INCLUDE_LIBRARY
            .iter()
            .map(|(name, params, body)| ProcedureDecl {
                name: (*name).to_string(),
                params: params.iter().map(|param| (*param).to_string()).collect(),
                body: (*body).to_string(),
                tag: SourceTag::new("<auto-include>", 0),
            })
            .collect();
        compile_procedures(&decls).expect("auto-include library must compile")
    })
}

/// Registers the implicit library, overwriting same-named entries.
pub fn register_auto_includes(env: &Environment) {
    env.include_procedures(auto_include_procedures().iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_compiles_and_registers_every_procedure() {
        let env = Environment::new();
        register_auto_includes(&env);
        for (name, _, _) in AUTO_INCLUDE_LIBRARY {
            assert!(env.procedure(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let env = Environment::new();
        register_auto_includes(&env);
        register_auto_includes(&env);
        assert_eq!(env.procedures().len(), AUTO_INCLUDE_LIBRARY.len());
    }
}
