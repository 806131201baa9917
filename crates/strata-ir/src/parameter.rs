use serde::{Deserialize, Serialize};
use strata_core::{DataType, StrataError, StrataResult, Value};

use crate::effect::ParameterSpec;
use crate::keyframe::{Handle, Keyframe, KeyframeKind};

/// An animatable, range-limited value owned by a layer or an effect instance.
///
/// Invariants kept by every mutator:
/// - `current_value` and all keyframe values lie within `[min, max]`;
/// - keyframes are sorted ascending by frame with at most one per frame.
///
/// Deserialization rebuilds the parameter through the same mutators, so
/// stored data cannot bypass either invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter")]
pub struct Parameter {
    pub name: String,
    data_type: DataType,
    current_value: Value,
    default: Value,
    min: Option<Value>,
    max: Option<Value>,
    accepts_keyframes: bool,
    keyframes: Vec<Keyframe>,
}

/// Field-for-field wire form of [`Parameter`], checked on conversion.
#[derive(Deserialize)]
struct RawParameter {
    name: String,
    data_type: DataType,
    current_value: Value,
    default: Value,
    min: Option<Value>,
    max: Option<Value>,
    accepts_keyframes: bool,
    keyframes: Vec<Keyframe>,
}

impl TryFrom<RawParameter> for Parameter {
    type Error = StrataError;

    fn try_from(raw: RawParameter) -> StrataResult<Self> {
        let parameter = Parameter::new(raw.name, raw.default);
        if parameter.data_type != raw.data_type {
            return Err(StrataError::configuration(format!(
                "parameter '{}' is declared {} but its default is {}",
                parameter.name, raw.data_type, parameter.data_type
            )));
        }
        for bound in raw.min.iter().chain(raw.max.iter()) {
            parameter.check_type(bound)?;
        }
        let mut parameter = parameter
            .with_range(raw.min, raw.max)
            .keyframable(raw.accepts_keyframes);
        parameter.set_value(raw.current_value)?;
        for keyframe in raw.keyframes {
            parameter.insert_keyframe(keyframe)?;
        }
        Ok(parameter)
    }
}

impl Parameter {
    /// A keyframable parameter whose type is taken from `default`.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            data_type: default.data_type(),
            current_value: default,
            default,
            min: None,
            max: None,
            accepts_keyframes: true,
            keyframes: Vec::new(),
        }
    }

    /// Build from an effect schema entry that has already been validated.
    pub fn from_spec(spec: &ParameterSpec) -> Self {
        Self {
            name: spec.name.clone(),
            data_type: spec.data_type,
            current_value: spec.default,
            default: spec.default,
            min: spec.min,
            max: spec.max,
            accepts_keyframes: spec.accepts_keyframes,
            keyframes: Vec::new(),
        }
    }

    /// Builder: restrict to `[min, max]`. Bounds of the wrong type are ignored.
    pub fn with_range(mut self, min: Option<Value>, max: Option<Value>) -> Self {
        self.min = min.filter(|v| v.data_type() == self.data_type);
        self.max = max.filter(|v| v.data_type() == self.data_type);
        self.current_value = self.clip(&self.current_value);
        self.default = self.clip(&self.default);
        self
    }

    /// Builder: toggle keyframe support.
    pub fn keyframable(mut self, accepts: bool) -> Self {
        self.accepts_keyframes = accepts;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> &Value {
        &self.current_value
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn accepts_keyframes(&self) -> bool {
        self.accepts_keyframes
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn keyframe_at(&self, frame: i64) -> Option<&Keyframe> {
        self.search(frame).ok().map(|i| &self.keyframes[i])
    }

    /// Whether evaluation depends on the frame at all.
    pub fn is_animated(&self) -> bool {
        self.accepts_keyframes && self.keyframes.len() > 1
    }

    fn clip(&self, value: &Value) -> Value {
        value.clip(self.min.as_ref(), self.max.as_ref())
    }

    fn check_type(&self, value: &Value) -> StrataResult<()> {
        if value.data_type() != self.data_type {
            return Err(StrataError::configuration(format!(
                "parameter '{}' expects a {} value, got {}",
                self.name,
                self.data_type,
                value.data_type()
            )));
        }
        Ok(())
    }

    fn search(&self, frame: i64) -> Result<usize, usize> {
        self.keyframes.binary_search_by_key(&frame, |k| k.frame)
    }

    /// Assign the static value, clipped to the parameter's range.
    pub fn set_value(&mut self, value: impl Into<Value>) -> StrataResult<()> {
        let value = value.into();
        self.check_type(&value)?;
        self.current_value = self.clip(&value);
        Ok(())
    }

    /// Restore the default value and drop all keyframes.
    pub fn reset(&mut self) {
        self.current_value = self.default;
        self.keyframes.clear();
    }

    /// Add or replace the keyframe at `frame`.
    pub fn set_keyframe(
        &mut self,
        frame: i64,
        value: impl Into<Value>,
        kind: KeyframeKind,
    ) -> StrataResult<()> {
        self.insert_keyframe(Keyframe::new(frame, value.into(), kind))
    }

    /// Insert a fully specified keyframe, replacing any entry at the same frame.
    pub fn insert_keyframe(&mut self, mut keyframe: Keyframe) -> StrataResult<()> {
        if !self.accepts_keyframes {
            return Err(StrataError::configuration(format!(
                "parameter '{}' does not accept keyframes",
                self.name
            )));
        }
        self.check_type(&keyframe.value)?;
        for handle in [&keyframe.left, &keyframe.right] {
            self.check_type(&handle.offset)?;
        }
        keyframe.value = self.clip(&keyframe.value);
        keyframe.left.influence = keyframe.left.influence.clamp(0.0, 1.0);
        keyframe.right.influence = keyframe.right.influence.clamp(0.0, 1.0);

        match self.search(keyframe.frame) {
            Ok(i) => self.keyframes[i] = keyframe,
            Err(i) => self.keyframes.insert(i, keyframe),
        }
        tracing::trace!(
            parameter = %self.name,
            frame = keyframe.frame,
            count = self.keyframes.len(),
            "keyframe set"
        );
        Ok(())
    }

    /// Replace the handles of the keyframe at `frame`.
    pub fn set_handles(&mut self, frame: i64, left: Handle, right: Handle) -> StrataResult<()> {
        let Some(existing) = self.keyframe_at(frame).copied() else {
            return Err(StrataError::configuration(format!(
                "parameter '{}' has no keyframe at frame {}",
                self.name, frame
            )));
        };
        self.insert_keyframe(existing.with_handles(left, right))
    }

    pub fn remove_keyframe(&mut self, frame: i64) -> Option<Keyframe> {
        let i = self.search(frame).ok()?;
        Some(self.keyframes.remove(i))
    }

    pub fn clear_keyframes(&mut self) {
        self.keyframes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(p: &Parameter) -> Vec<i64> {
        p.keyframes().iter().map(|k| k.frame).collect()
    }

    #[test]
    fn test_set_value_clips() {
        let mut p = Parameter::new("opacity", 1.0)
            .with_range(Some(Value::Number(0.0)), Some(Value::Number(1.0)));
        p.set_value(4.0).unwrap();
        assert_eq!(p.value(), &Value::Number(1.0));
        p.set_value(-2.0).unwrap();
        assert_eq!(p.value(), &Value::Number(0.0));
    }

    #[test]
    fn test_set_value_rejects_type_mismatch() {
        let mut p = Parameter::new("opacity", 1.0);
        let err = p.set_value(Value::Boolean(true)).unwrap_err();
        assert!(matches!(err, StrataError::Configuration(_)));
    }

    #[test]
    fn test_keyframes_stay_sorted_and_unique() {
        let mut p = Parameter::new("x", 0.0);
        for f in [10, 0, 5, 20, 5, 15, 0] {
            p.set_keyframe(f, f as f64, KeyframeKind::Linear).unwrap();
        }
        assert_eq!(frames(&p), vec![0, 5, 10, 15, 20]);

        p.set_keyframe(10, 99.0, KeyframeKind::Constant).unwrap();
        assert_eq!(frames(&p), vec![0, 5, 10, 15, 20]);
        assert_eq!(p.keyframe_at(10).unwrap().value, Value::Number(99.0));

        assert!(p.remove_keyframe(5).is_some());
        assert!(p.remove_keyframe(5).is_none());
        p.set_keyframe(-3, 1.0, KeyframeKind::Linear).unwrap();
        assert_eq!(frames(&p), vec![-3, 0, 10, 15, 20]);
        assert!(p.keyframes().windows(2).all(|w| w[0].frame < w[1].frame));
    }

    #[test]
    fn test_keyframe_values_are_clipped() {
        let mut p = Parameter::new("amount", 0.5)
            .with_range(Some(Value::Number(0.0)), Some(Value::Number(1.0)));
        p.set_keyframe(0, 3.0, KeyframeKind::Linear).unwrap();
        assert_eq!(p.keyframe_at(0).unwrap().value, Value::Number(1.0));
    }

    #[test]
    fn test_non_keyframable_rejects_keyframes() {
        let mut p = Parameter::new("seed", 1i64).keyframable(false);
        assert!(p.set_keyframe(0, 2i64, KeyframeKind::Linear).is_err());
        assert!(p.keyframes().is_empty());
    }

    #[test]
    fn test_set_handles_requires_existing_keyframe() {
        let mut p = Parameter::new("x", 0.0);
        assert!(p.set_handles(3, Handle::flat(&Value::Number(0.0)), Handle::flat(&Value::Number(0.0))).is_err());
        p.set_keyframe(3, 1.0, KeyframeKind::Bezier).unwrap();
        p.set_handles(3, Handle::new(0.5, Value::Number(1.0)), Handle::new(2.0, Value::Number(-1.0)))
            .unwrap();
        let kf = p.keyframe_at(3).unwrap();
        assert_eq!(kf.left.influence, 0.5);
        assert_eq!(kf.right.influence, 1.0);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut p = Parameter::new("x", 2.0);
        p.set_value(5.0).unwrap();
        p.set_keyframe(0, 1.0, KeyframeKind::Linear).unwrap();
        p.reset();
        assert_eq!(p.value(), &Value::Number(2.0));
        assert!(p.keyframes().is_empty());
    }

    #[test]
    fn test_deserialize_restores_invariants() {
        let json = r#"{
            "name": "amount",
            "data_type": "Number",
            "current_value": { "Number": 7.0 },
            "default": { "Number": 0.5 },
            "min": { "Number": 0.0 },
            "max": { "Number": 1.0 },
            "accepts_keyframes": true,
            "keyframes": [
                { "frame": 10, "value": { "Number": 0.2 }, "kind": "Linear",
                  "left": { "influence": 0.3, "offset": { "Number": 0.0 } },
                  "right": { "influence": 0.3, "offset": { "Number": 0.0 } } },
                { "frame": 0, "value": { "Number": -4.0 }, "kind": "Linear",
                  "left": { "influence": 0.3, "offset": { "Number": 0.0 } },
                  "right": { "influence": 0.3, "offset": { "Number": 0.0 } } },
                { "frame": 10, "value": { "Number": 9.0 }, "kind": "Constant",
                  "left": { "influence": 5.0, "offset": { "Number": 0.0 } },
                  "right": { "influence": 0.3, "offset": { "Number": 0.0 } } }
            ]
        }"#;
        let p: Parameter = serde_json::from_str(json).unwrap();
        assert_eq!(p.value(), &Value::Number(1.0));
        assert_eq!(frames(&p), vec![0, 10]);
        assert_eq!(p.keyframe_at(0).unwrap().value, Value::Number(0.0));
        let last = p.keyframe_at(10).unwrap();
        assert_eq!(last.value, Value::Number(1.0));
        assert_eq!(last.kind, KeyframeKind::Constant);
        assert_eq!(last.left.influence, 1.0);

        let back: Parameter = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_data() {
        let keyframed_static = r#"{
            "name": "seed", "data_type": "Integer",
            "current_value": { "Integer": 1 }, "default": { "Integer": 0 },
            "min": null, "max": null, "accepts_keyframes": false,
            "keyframes": [
                { "frame": 0, "value": { "Integer": 3 }, "kind": "Linear",
                  "left": { "influence": 0.3, "offset": { "Integer": 0 } },
                  "right": { "influence": 0.3, "offset": { "Integer": 0 } } }
            ]
        }"#;
        assert!(serde_json::from_str::<Parameter>(keyframed_static).is_err());

        let mistyped = r#"{
            "name": "x", "data_type": "Number",
            "current_value": { "Boolean": true }, "default": { "Number": 0.0 },
            "min": null, "max": null, "accepts_keyframes": true, "keyframes": []
        }"#;
        assert!(serde_json::from_str::<Parameter>(mistyped).is_err());

        let wrong_declared_type = r#"{
            "name": "x", "data_type": "Color",
            "current_value": { "Number": 0.0 }, "default": { "Number": 0.0 },
            "min": null, "max": null, "accepts_keyframes": true, "keyframes": []
        }"#;
        assert!(serde_json::from_str::<Parameter>(wrong_declared_type).is_err());
    }
}
