use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::{Color, StrataError, StrataResult, Value};
use uuid::Uuid;

use crate::effect::EffectInstance;
use crate::parameter::Parameter;

/// Names of the intrinsic layer parameters.
pub mod param {
    /// Fraction of the sequence dimensions where the anchor lands.
    pub const POSITION: &str = "position";
    /// Fraction of the content dimensions placed at `position`.
    pub const ANCHOR: &str = "anchor";
    pub const SCALE: &str = "scale";
    /// Radians.
    pub const ROTATION: &str = "rotation";
    pub const OPACITY: &str = "opacity";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const COLOR: &str = "color";
}

/// Unique identifier for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a layer draws before its effects run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerContent {
    /// A rectangle of the layer's `width`×`height`, filled with its `color`.
    Solid,
    /// Fully transparent content the size of the sequence; useful as an
    /// effect-only layer (e.g. a generator).
    Empty,
}

/// A time-bounded element of a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub title: String,
    /// First frame the layer is visible on.
    pub start_frame: i64,
    /// First frame the layer is no longer visible on.
    pub end_frame: i64,
    pub content: LayerContent,
    /// Effect chain, applied in order.
    pub effects: Vec<EffectInstance>,
    parameters: BTreeMap<String, Parameter>,
}

impl Layer {
    fn with_content(title: impl Into<String>, start_frame: i64, end_frame: i64, content: LayerContent) -> Self {
        let mut layer = Self {
            id: LayerId::new(),
            title: title.into(),
            start_frame,
            end_frame,
            content,
            effects: Vec::new(),
            parameters: BTreeMap::new(),
        };
        layer.insert_parameter(Parameter::new(param::POSITION, Value::Vector2([0.5, 0.5])));
        layer.insert_parameter(Parameter::new(param::ANCHOR, Value::Vector2([0.5, 0.5])));
        layer.insert_parameter(Parameter::new(param::SCALE, Value::Vector2([1.0, 1.0])));
        layer.insert_parameter(Parameter::new(param::ROTATION, 0.0));
        layer.insert_parameter(
            Parameter::new(param::OPACITY, 1.0)
                .with_range(Some(Value::Number(0.0)), Some(Value::Number(1.0))),
        );
        layer
    }

    /// A solid colour layer of the given content size, visible on
    /// `[start_frame, end_frame)`.
    pub fn solid(
        title: impl Into<String>,
        start_frame: i64,
        end_frame: i64,
        width: u32,
        height: u32,
        color: Color,
    ) -> Self {
        let mut layer = Self::with_content(title, start_frame, end_frame, LayerContent::Solid);
        for (name, size) in [(param::WIDTH, width), (param::HEIGHT, height)] {
            layer.insert_parameter(
                Parameter::new(name, Value::Integer(i64::from(size.max(1))))
                    .with_range(Some(Value::Integer(1)), None),
            );
        }
        layer.insert_parameter(Parameter::new(param::COLOR, color));
        layer
    }

    /// A transparent layer, visible on `[start_frame, end_frame)`.
    pub fn empty(title: impl Into<String>, start_frame: i64, end_frame: i64) -> Self {
        Self::with_content(title, start_frame, end_frame, LayerContent::Empty)
    }

    fn insert_parameter(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.name.clone(), parameter);
    }

    /// Whether `frame` falls within the half-open window `[start_frame, end_frame)`.
    pub fn is_visible_at(&self, frame: i64) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }

    pub fn add_effect(&mut self, effect: EffectInstance) {
        self.effects.push(effect);
    }

    /// Builder: append an effect.
    pub fn with_effect(mut self, effect: EffectInstance) -> Self {
        self.add_effect(effect);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// Like [`Layer::parameter`], but a missing intrinsic is an error.
    pub fn require(&self, name: &str) -> StrataResult<&Parameter> {
        self.parameter(name).ok_or_else(|| {
            StrataError::configuration(format!("layer '{}' has no parameter '{}'", self.title, name))
        })
    }

    /// Builder: set the static value of an intrinsic parameter.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> StrataResult<Self> {
        let title = self.title.clone();
        self.parameter_mut(name)
            .ok_or_else(|| {
                StrataError::configuration(format!("layer '{}' has no parameter '{}'", title, name))
            })?
            .set_value(value)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::DataType;

    #[test]
    fn test_visibility_window_is_half_open() {
        let layer = Layer::empty("fx", 10, 20);
        assert!(!layer.is_visible_at(9));
        assert!(layer.is_visible_at(10));
        assert!(layer.is_visible_at(19));
        assert!(!layer.is_visible_at(20));
    }

    #[test]
    fn test_solid_intrinsics() {
        let layer = Layer::solid("bg", 0, 30, 64, 32, Color::RED);
        assert_eq!(layer.content, LayerContent::Solid);
        assert_eq!(layer.parameter(param::WIDTH).unwrap().value(), &Value::Integer(64));
        assert_eq!(layer.parameter(param::HEIGHT).unwrap().value(), &Value::Integer(32));
        assert_eq!(layer.parameter(param::COLOR).unwrap().value(), &Value::Color(Color::RED));
        assert_eq!(
            layer.parameter(param::POSITION).unwrap().value(),
            &Value::Vector2([0.5, 0.5])
        );
        assert_eq!(layer.parameter(param::ROTATION).unwrap().data_type(), DataType::Number);
        assert_eq!(layer.parameters().count(), 8);
    }

    #[test]
    fn test_empty_has_only_transform_intrinsics() {
        let layer = Layer::empty("fx", 0, 1);
        assert!(layer.parameter(param::COLOR).is_none());
        assert!(layer.require(param::WIDTH).is_err());
        assert_eq!(layer.parameters().count(), 5);
    }

    #[test]
    fn test_opacity_is_clipped() {
        let layer = Layer::empty("fx", 0, 1).with_value(param::OPACITY, 3.0).unwrap();
        assert_eq!(layer.parameter(param::OPACITY).unwrap().value(), &Value::Number(1.0));
    }

    #[test]
    fn test_zero_size_solid_is_clamped() {
        let layer = Layer::solid("thin", 0, 1, 0, 5, Color::WHITE);
        assert_eq!(layer.parameter(param::WIDTH).unwrap().value(), &Value::Integer(1));
    }

    #[test]
    fn test_layer_ids_are_unique() {
        let a = Layer::empty("a", 0, 1);
        let b = Layer::empty("b", 0, 1);
        assert_ne!(a.id, b.id);
    }
}
