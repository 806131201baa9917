use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{Color, StrataError, StrataResult, Value};
use strata_ir::{EffectFlags, EffectInstance, EffectSchema, ParameterSpec};

use crate::context::RenderContext;

/// A GPU image transformation that can be placed in a layer's effect chain.
pub trait Effect: Send + Sync {
    /// Identifier effect instances refer to.
    fn id(&self) -> &str;

    /// The ordered parameter schema.
    fn declare_parameters(&self) -> Vec<ParameterSpec>;

    fn flags(&self) -> EffectFlags {
        EffectFlags::NONE
    }

    /// Read the context's source and write its destination.
    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()>;
}

/// Parameter values evaluated for one stage, in schema order.
#[derive(Debug)]
pub struct EffectArgs<'a> {
    schema: &'a EffectSchema,
    values: Vec<Value>,
}

impl<'a> EffectArgs<'a> {
    pub fn new(schema: &'a EffectSchema, values: Vec<Value>) -> Self {
        Self { schema, values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> StrataResult<&Value> {
        self.schema
            .parameters
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| {
                StrataError::render(format!(
                    "effect '{}' was given no value for '{}'",
                    self.schema.id, name
                ))
            })
    }

    fn mismatch(&self, name: &str, expected: &str) -> StrataError {
        StrataError::render(format!(
            "effect '{}': parameter '{}' is not a {}",
            self.schema.id, name, expected
        ))
    }

    pub fn number(&self, name: &str) -> StrataResult<f64> {
        self.get(name)?
            .as_number()
            .ok_or_else(|| self.mismatch(name, "number"))
    }

    pub fn integer(&self, name: &str) -> StrataResult<i64> {
        self.get(name)?
            .as_integer()
            .ok_or_else(|| self.mismatch(name, "integer"))
    }

    pub fn boolean(&self, name: &str) -> StrataResult<bool> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.mismatch(name, "boolean"))
    }

    pub fn color(&self, name: &str) -> StrataResult<Color> {
        self.get(name)?
            .as_color()
            .ok_or_else(|| self.mismatch(name, "color"))
    }
}

/// An effect together with its validated schema.
pub struct RegisteredEffect {
    effect: Arc<dyn Effect>,
    schema: EffectSchema,
}

impl RegisteredEffect {
    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    pub fn schema(&self) -> &EffectSchema {
        &self.schema
    }
}

/// Maps effect ids to their schemas and programs.
#[derive(Default)]
pub struct EffectRegistry {
    effects: HashMap<String, RegisteredEffect>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in effects.
    pub fn with_builtin() -> StrataResult<Self> {
        let mut registry = Self::new();
        crate::effects::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register an effect after validating its schema. Ids must be unique.
    pub fn register(&mut self, effect: impl Effect + 'static) -> StrataResult<()> {
        let schema = EffectSchema {
            id: effect.id().to_string(),
            parameters: effect.declare_parameters(),
            flags: effect.flags(),
        };
        schema.validate()?;
        if self.effects.contains_key(&schema.id) {
            return Err(StrataError::configuration(format!(
                "effect '{}' is already registered",
                schema.id
            )));
        }
        tracing::debug!(effect = %schema.id, parameters = schema.parameters.len(), "effect registered");
        self.effects.insert(
            schema.id.clone(),
            RegisteredEffect {
                effect: Arc::new(effect),
                schema,
            },
        );
        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Option<&RegisteredEffect> {
        self.effects.get(id)
    }

    /// A new instance of `id` with every parameter at its default.
    pub fn instantiate(&self, id: &str) -> StrataResult<EffectInstance> {
        self.resolve(id)
            .map(|r| EffectInstance::from_schema(&r.schema))
            .ok_or_else(|| StrataError::configuration(format!("unknown effect '{}'", id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
