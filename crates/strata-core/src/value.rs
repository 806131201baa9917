//! Tagged parameter values.
//!
//! Every animatable quantity in a sequence is one of a closed set of value
//! kinds. Interpolation and clipping dispatch on the variant explicitly; a
//! pair of mismatched variants is rejected when a value is assigned, so the
//! evaluation helpers here only have to stay total, not report errors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::color::Color;

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Number,
    Integer,
    Boolean,
    Vector2,
    Vector3,
    Color,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Number => write!(f, "number"),
            DataType::Integer => write!(f, "integer"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Vector2 => write!(f, "vector2"),
            DataType::Vector3 => write!(f, "vector3"),
            DataType::Color => write!(f, "color"),
        }
    }
}

/// A concrete parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Vector2([f64; 2]),
    Vector3([f64; 3]),
    Color(Color),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Number(_) => DataType::Number,
            Value::Integer(_) => DataType::Integer,
            Value::Boolean(_) => DataType::Boolean,
            Value::Vector2(_) => DataType::Vector2,
            Value::Vector3(_) => DataType::Vector3,
            Value::Color(_) => DataType::Color,
        }
    }

    /// The additive zero of this value's type.
    pub fn zero_like(&self) -> Value {
        match self {
            Value::Number(_) => Value::Number(0.0),
            Value::Integer(_) => Value::Integer(0),
            Value::Boolean(_) => Value::Boolean(false),
            Value::Vector2(_) => Value::Vector2([0.0; 2]),
            Value::Vector3(_) => Value::Vector3([0.0; 3]),
            Value::Color(_) => Value::Color(Color::TRANSPARENT),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<[f64; 2]> {
        match self {
            Value::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Scalar components, in declaration order. Booleans map to 0/1.
    fn components(&self) -> ([f64; 4], usize) {
        match self {
            Value::Number(v) => ([*v, 0.0, 0.0, 0.0], 1),
            Value::Integer(v) => ([*v as f64, 0.0, 0.0, 0.0], 1),
            Value::Boolean(v) => ([if *v { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0], 1),
            Value::Vector2(v) => ([v[0], v[1], 0.0, 0.0], 2),
            Value::Vector3(v) => ([v[0], v[1], v[2], 0.0], 3),
            Value::Color(c) => ([c.r as f64, c.g as f64, c.b as f64, c.a as f64], 4),
        }
    }

    /// Rebuild a value of `self`'s type from scalar components.
    fn with_components(&self, c: [f64; 4]) -> Value {
        match self {
            Value::Number(_) => Value::Number(c[0]),
            Value::Integer(_) => Value::Integer(c[0].round() as i64),
            Value::Boolean(_) => Value::Boolean(c[0] >= 0.5),
            Value::Vector2(_) => Value::Vector2([c[0], c[1]]),
            Value::Vector3(_) => Value::Vector3([c[0], c[1], c[2]]),
            Value::Color(_) => {
                Value::Color(Color::rgba(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))
            }
        }
    }

    /// Apply `f` componentwise across values of the same type. Mismatched
    /// types yield `self` unchanged.
    fn zip_with(&self, others: &[&Value], f: impl Fn(&[f64]) -> f64) -> Value {
        if others.iter().any(|o| o.data_type() != self.data_type()) {
            return *self;
        }
        let (base, n) = self.components();
        let rest: Vec<[f64; 4]> = others.iter().map(|o| o.components().0).collect();
        let mut out = [0.0; 4];
        let mut lane = Vec::with_capacity(others.len() + 1);
        for i in 0..n {
            lane.clear();
            lane.push(base[i]);
            lane.extend(rest.iter().map(|c| c[i]));
            out[i] = f(&lane);
        }
        self.with_components(out)
    }

    /// Linear blend between `a` and `b`. Booleans step at `t >= 1`.
    pub fn lerp(a: &Value, b: &Value, t: f64) -> Value {
        if let (Value::Boolean(_), Value::Boolean(_)) = (a, b) {
            return if t >= 1.0 { *b } else { *a };
        }
        a.zip_with(&[b], |v| v[0] + (v[1] - v[0]) * t)
    }

    /// `self + delta * sign`, componentwise.
    pub fn offset(&self, delta: &Value, sign: f64) -> Value {
        if let Value::Boolean(_) = self {
            return *self;
        }
        self.zip_with(&[delta], |v| v[0] + v[1] * sign)
    }

    /// Evaluate the cubic Bernstein basis on four control values at `u`.
    pub fn bezier(y0: &Value, y1: &Value, y2: &Value, y3: &Value, u: f64) -> Value {
        if let Value::Boolean(_) = y0 {
            return if u >= 1.0 { *y3 } else { *y0 };
        }
        let v = 1.0 - u;
        let (b0, b1, b2, b3) = (v * v * v, 3.0 * v * v * u, 3.0 * v * u * u, u * u * u);
        y0.zip_with(&[y1, y2, y3], |c| {
            c[0] * b0 + c[1] * b1 + c[2] * b2 + c[3] * b3
        })
    }

    /// Clamp componentwise into `[min, max]`. Either bound may be absent.
    pub fn clip(&self, min: Option<&Value>, max: Option<&Value>) -> Value {
        if let Value::Boolean(_) = self {
            return *self;
        }
        let mut out = *self;
        if let Some(min) = min {
            out = out.zip_with(&[min], |v| v[0].max(v[1]));
        }
        if let Some(max) = max {
            out = out.zip_with(&[max], |v| v[0].min(v[1]));
        }
        out
    }

    /// Whether every component of `self` is `<=` the matching one of `other`.
    pub fn le(&self, other: &Value) -> bool {
        if self.data_type() != other.data_type() {
            return false;
        }
        let (a, n) = self.components();
        let (b, _) = other.components();
        (0..n).all(|i| a[i] <= b[i])
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Vector2(v) => write!(f, "({}, {})", v[0], v[1]),
            Value::Vector3(v) => write!(f, "({}, {}, {})", v[0], v[1], v[2]),
            Value::Color(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_number_and_vector() {
        assert_eq!(Value::lerp(&Value::Number(0.0), &Value::Number(10.0), 0.5), Value::Number(5.0));
        let v = Value::lerp(&Value::Vector2([0.0, 2.0]), &Value::Vector2([4.0, 6.0]), 0.25);
        assert_eq!(v, Value::Vector2([1.0, 3.0]));
    }

    #[test]
    fn test_lerp_integer_rounds() {
        let v = Value::lerp(&Value::Integer(0), &Value::Integer(3), 0.5);
        assert_eq!(v, Value::Integer(2));
    }

    #[test]
    fn test_lerp_boolean_steps() {
        let a = Value::Boolean(false);
        let b = Value::Boolean(true);
        assert_eq!(Value::lerp(&a, &b, 0.99), a);
        assert_eq!(Value::lerp(&a, &b, 1.0), b);
    }

    #[test]
    fn test_mismatched_types_keep_left_operand() {
        let a = Value::Number(1.0);
        assert_eq!(Value::lerp(&a, &Value::Vector2([5.0, 5.0]), 0.5), a);
    }

    #[test]
    fn test_clip_componentwise() {
        let v = Value::Vector2([-1.0, 5.0]);
        let clipped = v.clip(Some(&Value::Vector2([0.0, 0.0])), Some(&Value::Vector2([1.0, 1.0])));
        assert_eq!(clipped, Value::Vector2([0.0, 1.0]));
        assert_eq!(Value::Number(2.0).clip(None, Some(&Value::Number(1.5))), Value::Number(1.5));
    }

    #[test]
    fn test_bezier_endpoints() {
        let y0 = Value::Number(2.0);
        let y3 = Value::Number(8.0);
        let y1 = Value::Number(5.0);
        let y2 = Value::Number(-1.0);
        assert_eq!(Value::bezier(&y0, &y1, &y2, &y3, 0.0), y0);
        assert_eq!(Value::bezier(&y0, &y1, &y2, &y3, 1.0), y3);
    }

    #[test]
    fn test_offset_and_le() {
        let v = Value::Number(1.0).offset(&Value::Number(0.5), -1.0);
        assert_eq!(v, Value::Number(0.5));
        assert!(Value::Vector2([0.0, 1.0]).le(&Value::Vector2([0.0, 2.0])));
        assert!(!Value::Number(1.0).le(&Value::Integer(2)));
    }
}
