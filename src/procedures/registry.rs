use super::arguments::Arguments;
use super::context::ProcedureContext;
use super::error::RegistryError;
use crate::executor::ProcInit;
use crate::shared::{validate_cache_filename, ProcedureName};
use crate::store::ArgumentBinding;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub type ProcedureFn =
    Arc<dyn Fn(&ProcedureContext, &Arguments) -> anyhow::Result<Value> + Send + Sync>;

/// A declared parameter. `default: None` marks it required.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Clone)]
pub struct ProcedureDef {
    name: String,
    params: Vec<ParamSpec>,
    cache_outputs: Vec<String>,
    description: String,
    func: ProcedureFn,
}

impl ProcedureDef {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ProcedureContext, &Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            cache_outputs: Vec::new(),
            description: String::new(),
            func: Arc::new(func),
        }
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Names under which the result is written to the cache. With more than
    /// one name the result must be an array of matching length.
    pub fn cache_outputs<I, S>(mut self, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_outputs = filenames.into_iter().map(Into::into).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn cache_output_names(&self) -> &[String] {
        &self.cache_outputs
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn validate(&self) -> Result<(), RegistryError> {
        ProcedureName::parse(&self.name).map_err(|reason| RegistryError::InvalidName {
            name: self.name.clone(),
            reason,
        })?;
        let mut seen = BTreeSet::new();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(RegistryError::DuplicateParameter {
                    procedure: self.name.clone(),
                    param: param.name.clone(),
                });
            }
        }
        for filename in &self.cache_outputs {
            validate_cache_filename(filename).map_err(|reason| {
                RegistryError::InvalidCacheOutput {
                    procedure: self.name.clone(),
                    filename: filename.clone(),
                    reason,
                }
            })?;
        }
        Ok(())
    }

    /// Checks supplied argument names against the declared parameters.
    pub fn check_argument_names<'a, I>(&self, supplied: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = BTreeSet::new();
        for argument in supplied {
            if self.param_spec(argument).is_none() {
                return Err(RegistryError::UnknownArgument {
                    procedure: self.name.clone(),
                    argument: argument.to_string(),
                });
            }
            if !seen.insert(argument) {
                return Err(RegistryError::DuplicateArgument {
                    procedure: self.name.clone(),
                    argument: argument.to_string(),
                });
            }
        }
        if let Some(missing) = self
            .params
            .iter()
            .find(|param| param.is_required() && !seen.contains(param.name.as_str()))
        {
            return Err(RegistryError::MissingArgument {
                procedure: self.name.clone(),
                argument: missing.name.clone(),
            });
        }
        Ok(())
    }

    fn with_defaults(&self, mut arguments: Arguments) -> Arguments {
        for param in &self.params {
            let Some(default) = &param.default else {
                continue;
            };
            if !arguments.contains(&param.name) {
                arguments.insert(param.name.clone(), default.clone());
            }
        }
        arguments
    }
}

impl fmt::Debug for ProcedureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("cache_outputs", &self.cache_outputs)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Lookup table of procedures, populated before any run executes.
#[derive(Debug, Clone, Default)]
pub struct ProcedureRegistry {
    procedures: BTreeMap<String, ProcedureDef>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration for a name wins; the replaced definition is returned.
    pub fn register(&mut self, def: ProcedureDef) -> Result<Option<ProcedureDef>, RegistryError> {
        def.validate()?;
        Ok(self.procedures.insert(def.name.clone(), def))
    }

    pub fn get(&self, name: &str) -> Result<&ProcedureDef, RegistryError> {
        self.procedures
            .get(name)
            .ok_or_else(|| RegistryError::UnknownProcedure {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.procedures.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Catalog of every procedure with its parameters pre-filled with their
    /// defaults, as offered to the run builder UI.
    pub fn proc_inits(&self) -> Vec<ProcInit> {
        self.procedures
            .values()
            .map(|def| ProcInit {
                proc_name: def.name.clone(),
                run_order: None,
                arguments: def
                    .params
                    .iter()
                    .map(|param| {
                        ArgumentBinding::literal(
                            param.name.clone(),
                            param.default.clone().unwrap_or(Value::Null),
                        )
                    })
                    .collect(),
                arguments_str: String::new(),
            })
            .collect()
    }

    /// Calls the procedure with `arguments` plus any omitted defaults. Errors
    /// and panics raised by the procedure come back as failures.
    pub fn invoke(
        &self,
        name: &str,
        context: &ProcedureContext,
        arguments: Arguments,
    ) -> Result<Value, RegistryError> {
        let def = self.get(name)?;
        def.check_argument_names(arguments.iter().map(|(argument, _)| argument))?;
        let arguments = def.with_defaults(arguments);

        match catch_unwind(AssertUnwindSafe(|| (def.func)(context, &arguments))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(RegistryError::ProcedureFailed {
                procedure: name.to_string(),
                message: format!("{err:#}"),
            }),
            Err(payload) => Err(RegistryError::ProcedurePanicked {
                procedure: name.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add() -> ProcedureDef {
        ProcedureDef::new("foo", |_ctx, args| Ok(json!(args.i64("a")? + args.i64("b")?)))
            .param("a")
            .param_with_default("b", 4)
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ProcedureRegistry::new();
        assert!(registry.register(add()).expect("first").is_none());
        let replaced = registry
            .register(ProcedureDef::new("foo", |_ctx, _args| Ok(json!(0))).describe("second"))
            .expect("second");
        assert!(replaced.is_some());
        assert_eq!(registry.get("foo").expect("foo").description(), "second");
    }

    #[test]
    fn argument_names_are_checked_against_params() {
        let def = add();
        def.check_argument_names(["a"]).expect("default fills b");
        assert!(matches!(
            def.check_argument_names(["b"]),
            Err(RegistryError::MissingArgument { .. })
        ));
        assert!(matches!(
            def.check_argument_names(["a", "c"]),
            Err(RegistryError::UnknownArgument { .. })
        ));
        assert!(matches!(
            def.check_argument_names(["a", "a"]),
            Err(RegistryError::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn register_rejects_bad_declarations() {
        let mut registry = ProcedureRegistry::new();
        let err = registry
            .register(ProcedureDef::new("bad name", |_ctx, _args| Ok(Value::Null)))
            .expect_err("invalid name");
        assert!(matches!(err, RegistryError::InvalidName { .. }));

        let err = registry
            .register(
                ProcedureDef::new("dup", |_ctx, _args| Ok(Value::Null))
                    .param("x")
                    .param("x"),
            )
            .expect_err("duplicate param");
        assert!(matches!(err, RegistryError::DuplicateParameter { .. }));

        let err = registry
            .register(
                ProcedureDef::new("out", |_ctx, _args| Ok(Value::Null))
                    .cache_outputs(["../model"]),
            )
            .expect_err("bad cache output");
        assert!(matches!(err, RegistryError::InvalidCacheOutput { .. }));
    }

    #[test]
    fn proc_inits_prefill_defaults() {
        let mut registry = ProcedureRegistry::new();
        registry.register(add()).expect("register");
        let inits = registry.proc_inits();
        assert_eq!(inits.len(), 1);
        assert_eq!(inits[0].run_order, None);
        assert_eq!(
            inits[0].arguments,
            vec![
                ArgumentBinding::literal("a", Value::Null),
                ArgumentBinding::literal("b", 4)
            ]
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
