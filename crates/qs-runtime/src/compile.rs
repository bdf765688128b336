use std::sync::{Arc, OnceLock};

use regex::Regex;
use rhai::{Engine, AST};

use qs_core::{CompileError, CompileErrorGroup, CompileFailure, SourceTag};

/// A compiled script unit plus its resolved source tag.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    ast: AST,
    tag: SourceTag,
}

impl CompiledUnit {
    pub fn tag(&self) -> &SourceTag {
        &self.tag
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

/// A named, callable unit owned by the procedure registry.
///
/// Immutable once compiled; the registry replaces a procedure only by an
/// explicit overwrite under the same name.
#[derive(Debug, Clone)]
pub struct Procedure {
    name: String,
    params: Vec<String>,
    body: Arc<CompiledUnit>,
    tag: SourceTag,
}

impl Procedure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn tag(&self) -> &SourceTag {
        &self.tag
    }

    pub(crate) fn unit(&self) -> &CompiledUnit {
        &self.body
    }
}

/// Input for bulk procedure compilation.
#[derive(Debug, Clone)]
pub struct ProcedureDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
    pub tag: SourceTag,
}

/// Compiles source with an unknown tag.
pub fn compile(source: &str) -> Result<CompiledUnit, CompileFailure> {
    compile_at(source, SourceTag::unknown())
}

pub fn compile_at(source: &str, tag: SourceTag) -> Result<CompiledUnit, CompileFailure> {
    let engine = Engine::new();
    match engine.compile(source) {
        Ok(ast) => Ok(CompiledUnit { ast, tag }),
        Err(error) => {
            let line = error.1.line().unwrap_or(tag.line);
            let at = SourceTag::new(tag.source, line);
            Err(CompileError::new(error.0.to_string(), at).into())
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
    })
}

/// Compiles one procedure declaration. Names carry the `_` prefix.
pub fn compile_procedure(
    name: &str,
    params: &[&str],
    body: &str,
) -> Result<Procedure, CompileFailure> {
    compile_procedure_at(name, params, body, SourceTag::unknown())
}

pub fn compile_procedure_at(
    name: &str,
    params: &[&str],
    body: &str,
    tag: SourceTag,
) -> Result<Procedure, CompileFailure> {
    if !name.starts_with('_') || !identifier_pattern().is_match(name) {
        return Err(CompileError::new(
            format!("procedure name \"{name}\" must be a \"_\"-prefixed identifier"),
            tag,
        )
        .into());
    }
    for param in params {
        if !identifier_pattern().is_match(param) {
            return Err(CompileError::new(
                format!("procedure parameter \"{param}\" is not a valid identifier"),
                tag,
            )
            .into());
        }
    }

    let source = format!("fn {}({}) {{\n{}\n}}", name, params.join(", "), body);
    let unit = compile_at(&source, tag.clone())?;
    Ok(Procedure {
        name: name.to_string(),
        params: params.iter().map(|param| (*param).to_string()).collect(),
        body: Arc::new(unit),
        tag,
    })
}

/// Compiles every declaration, collecting all failures into one group.
pub fn compile_procedures(decls: &[ProcedureDecl]) -> Result<Vec<Procedure>, CompileErrorGroup> {
    let mut procedures = Vec::new();
    let mut errors = Vec::new();

    for decl in decls {
        let params: Vec<&str> = decl.params.iter().map(String::as_str).collect();
        match compile_procedure_at(&decl.name, &params, &decl.body, decl.tag.clone()) {
            Ok(procedure) => procedures.push(procedure),
            Err(failure) => errors.extend(failure.errors().into_iter().cloned()),
        }
    }

    if errors.is_empty() {
        Ok(procedures)
    } else {
        Err(CompileErrorGroup::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_attaches_the_given_tag() {
        let unit = compile_at("1 + 1", SourceTag::new("startup.qs", 1)).expect("compile");
        assert_eq!(unit.tag().source, "startup.qs");

        let unknown = compile("1 + 1").expect("compile");
        assert!(unknown.tag().is_unknown());
    }

    #[test]
    fn compile_error_carries_message_and_location() {
        let failure = compile("let = ;").expect_err("syntax error");
        let errors = failure.errors();
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].message.is_empty());
    }

    #[test]
    fn procedure_names_must_be_underscore_prefixed_identifiers() {
        assert!(compile_procedure("greet", &[], "1").is_err());
        assert!(compile_procedure("_bad name", &[], "1").is_err());
        assert!(compile_procedure("_ok", &["a"], "a + 1").is_ok());
    }

    #[test]
    fn procedure_params_are_validated() {
        let failure = compile_procedure("_p", &["not valid"], "1").expect_err("bad param");
        assert!(failure.errors()[0].message.contains("parameter"));
    }

    #[test]
    fn bulk_compilation_aggregates_every_failure() {
        let decls = vec![
            ProcedureDecl {
                name: "_fine".to_string(),
                params: vec!["a".to_string()],
                body: "a".to_string(),
                tag: SourceTag::unknown(),
            },
            ProcedureDecl {
                name: "noprefix".to_string(),
                params: vec![],
                body: "1".to_string(),
                tag: SourceTag::new("lib.qs", 2),
            },
            ProcedureDecl {
                name: "_broken".to_string(),
                params: vec![],
                body: "let = ;".to_string(),
                tag: SourceTag::new("lib.qs", 9),
            },
        ];

        let group = compile_procedures(&decls).expect_err("two declarations fail");
        assert_eq!(group.errors.len(), 2);
    }
}
