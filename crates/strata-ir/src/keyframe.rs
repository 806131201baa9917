use serde::{Deserialize, Serialize};
use strata_core::Value;

/// How a keyframe shapes the curve around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyframeKind {
    /// Holds its value until the next keyframe.
    Constant,
    Linear,
    /// Both handles are active.
    Bezier,
    /// Only the incoming (left) handle is active.
    BezierLeft,
    /// Only the outgoing (right) handle is active.
    BezierRight,
}

impl KeyframeKind {
    /// Whether the segment leaving this keyframe is shaped by its right handle.
    pub fn has_right_handle(&self) -> bool {
        matches!(self, KeyframeKind::Bezier | KeyframeKind::BezierRight)
    }

    /// Whether the segment arriving at this keyframe is shaped by its left handle.
    pub fn has_left_handle(&self) -> bool {
        matches!(self, KeyframeKind::Bezier | KeyframeKind::BezierLeft)
    }
}

/// A Bezier tangent.
///
/// `influence` is the handle's length along the time axis, normalized to the
/// segment it belongs to. `offset` is the handle's extent in value space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub influence: f64,
    pub offset: Value,
}

impl Handle {
    pub const DEFAULT_INFLUENCE: f64 = 1.0 / 3.0;

    pub fn new(influence: f64, offset: Value) -> Self {
        Self {
            influence: influence.clamp(0.0, 1.0),
            offset,
        }
    }

    /// A flat handle of default length for values shaped like `value`.
    pub fn flat(value: &Value) -> Self {
        Self::new(Self::DEFAULT_INFLUENCE, value.zero_like())
    }

    /// A handle with no extent; the curve leaves the keyframe like a straight line.
    pub fn collapsed(value: &Value) -> Self {
        Self::new(0.0, value.zero_like())
    }
}

/// A timestamped value anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: i64,
    pub value: Value,
    pub kind: KeyframeKind,
    pub left: Handle,
    pub right: Handle,
}

impl Keyframe {
    pub fn new(frame: i64, value: Value, kind: KeyframeKind) -> Self {
        Self {
            frame,
            value,
            kind,
            left: Handle::flat(&value),
            right: Handle::flat(&value),
        }
    }

    pub fn constant(frame: i64, value: impl Into<Value>) -> Self {
        Self::new(frame, value.into(), KeyframeKind::Constant)
    }

    pub fn linear(frame: i64, value: impl Into<Value>) -> Self {
        Self::new(frame, value.into(), KeyframeKind::Linear)
    }

    pub fn bezier(frame: i64, value: impl Into<Value>) -> Self {
        Self::new(frame, value.into(), KeyframeKind::Bezier)
    }

    pub fn with_handles(mut self, left: Handle, right: Handle) -> Self {
        self.left = left;
        self.right = right;
        self
    }
}
