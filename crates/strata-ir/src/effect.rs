use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strata_core::{DataType, StrataError, StrataResult, Value};

use crate::parameter::Parameter;

/// One entry of an effect's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub data_type: DataType,
    pub default: Value,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub accepts_keyframes: bool,
}

impl ParameterSpec {
    /// A keyframable, unbounded parameter typed after `default`.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            data_type: default.data_type(),
            default,
            min: None,
            max: None,
            accepts_keyframes: true,
        }
    }

    pub fn range(mut self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    pub fn static_only(mut self) -> Self {
        self.accepts_keyframes = false;
        self
    }

    fn validate(&self, effect_id: &str) -> StrataResult<()> {
        let fail = |msg: String| {
            Err(StrataError::configuration(format!(
                "effect '{}', parameter '{}': {}",
                effect_id, self.name, msg
            )))
        };
        if self.name.is_empty() {
            return fail("parameter name is empty".into());
        }
        if self.default.data_type() != self.data_type {
            return fail(format!(
                "default is a {} but the parameter is declared {}",
                self.default.data_type(),
                self.data_type
            ));
        }
        for (label, bound) in [("min", &self.min), ("max", &self.max)] {
            if let Some(bound) = bound {
                if bound.data_type() != self.data_type {
                    return fail(format!("{} has type {}", label, bound.data_type()));
                }
            }
        }
        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            if !min.le(max) {
                return fail(format!("min {} exceeds max {}", min, max));
            }
        }
        if self.default.clip(self.min.as_ref(), self.max.as_ref()) != self.default {
            return fail(format!("default {} lies outside its range", self.default));
        }
        Ok(())
    }
}

/// Capability flags declared by an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectFlags(u32);

impl EffectFlags {
    pub const NONE: EffectFlags = EffectFlags(0);
    /// The effect's output does not depend on its input.
    pub const WRITEONLY: EffectFlags = EffectFlags(1);

    pub fn contains(&self, other: EffectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: EffectFlags) -> EffectFlags {
        EffectFlags(self.0 | other.0)
    }

    pub fn is_write_only(&self) -> bool {
        self.contains(EffectFlags::WRITEONLY)
    }
}

/// An effect's declared interface: its id, ordered parameters and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSchema {
    pub id: String,
    pub parameters: Vec<ParameterSpec>,
    pub flags: EffectFlags,
}

impl EffectSchema {
    /// Reject malformed schemas before an effect can be used.
    pub fn validate(&self) -> StrataResult<()> {
        if self.id.trim().is_empty() {
            return Err(StrataError::configuration("effect id is empty"));
        }
        let mut seen = HashSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.name.as_str()) {
                return Err(StrataError::configuration(format!(
                    "effect '{}' declares parameter '{}' twice",
                    self.id, spec.name
                )));
            }
            spec.validate(&self.id)?;
        }
        Ok(())
    }

    pub fn is_write_only(&self) -> bool {
        self.flags.is_write_only()
    }
}

/// An effect applied to a layer: the effect id plus concrete parameters in
/// schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectInstance {
    pub effect_id: String,
    parameters: Vec<Parameter>,
}

impl EffectInstance {
    /// Instantiate with every parameter at its schema default.
    pub fn from_schema(schema: &EffectSchema) -> Self {
        Self {
            effect_id: schema.id.clone(),
            parameters: schema.parameters.iter().map(Parameter::from_spec).collect(),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    /// Builder: set a parameter's static value.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> StrataResult<Self> {
        let effect_id = self.effect_id.clone();
        self.parameter_mut(name)
            .ok_or_else(|| {
                StrataError::configuration(format!(
                    "effect '{}' has no parameter '{}'",
                    effect_id, name
                ))
            })?
            .set_value(value)?;
        Ok(self)
    }

    /// Whether this instance's parameters line up with `schema`.
    pub fn matches(&self, schema: &EffectSchema) -> bool {
        self.effect_id == schema.id
            && self.parameters.len() == schema.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&schema.parameters)
                .all(|(p, s)| p.name == s.name && p.data_type() == s.data_type)
    }
}
