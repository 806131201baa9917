//! Parameter evaluation over time.
//!
//! Evaluation is a pure function of a parameter and a frame: it never fails
//! and never mutates. Frames before the first keyframe hold the first value,
//! frames after the last keyframe hold the last value.

use strata_core::Value;

use crate::bezier;
use crate::keyframe::{Handle, Keyframe, KeyframeKind};
use crate::parameter::Parameter;

/// How the segment between two keyframes is interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentShape {
    /// Hold the left value.
    Step,
    Linear,
    /// Only the left keyframe's outgoing handle shapes the curve.
    LeftBezier,
    /// Only the right keyframe's incoming handle shapes the curve.
    RightBezier,
    /// Both handles shape the curve.
    Bezier,
}

impl SegmentShape {
    /// Pick the interpolation for the segment `a → b` from the endpoint kinds.
    pub fn between(a: KeyframeKind, b: KeyframeKind) -> Self {
        if a == KeyframeKind::Constant {
            return SegmentShape::Step;
        }
        match (a.has_right_handle(), b.has_left_handle()) {
            (false, false) => SegmentShape::Linear,
            (false, true) => SegmentShape::RightBezier,
            (true, false) => SegmentShape::LeftBezier,
            (true, true) => SegmentShape::Bezier,
        }
    }
}

/// Stateless evaluator for animated parameters.
///
/// Construct one and pass it where evaluation is needed; it carries no
/// hidden global state, so tests can use their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationEvaluator;

impl AnimationEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// The value of `parameter` at `frame`.
    pub fn value_at(&self, parameter: &Parameter, frame: i64) -> Value {
        let keys = parameter.keyframes();
        if !parameter.accepts_keyframes() || keys.is_empty() {
            return *parameter.value();
        }
        if keys.len() == 1 {
            return keys[0].value;
        }

        let first = &keys[0];
        let last = &keys[keys.len() - 1];
        if frame <= first.frame {
            return first.value;
        }
        if frame >= last.frame {
            return last.value;
        }

        // Ascending scan for the bracketing pair; an exact hit returns verbatim.
        for pair in keys.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if frame == a.frame {
                return a.value;
            }
            if frame == b.frame {
                return b.value;
            }
            if frame > a.frame && frame < b.frame {
                // Widened so segments spanning most of the i64 range cannot overflow.
                let span = i128::from(b.frame) - i128::from(a.frame);
                let t = (i128::from(frame) - i128::from(a.frame)) as f64 / span as f64;
                return interpolate(a, b, t);
            }
        }
        last.value
    }
}

/// Free-function form of [`AnimationEvaluator::value_at`].
pub fn get_value_at_frame(parameter: &Parameter, frame: i64) -> Value {
    AnimationEvaluator.value_at(parameter, frame)
}

/// Interpolate the segment `a → b` at normalized time `t ∈ [0, 1]`.
pub fn interpolate(a: &Keyframe, b: &Keyframe, t: f64) -> Value {
    let shape = SegmentShape::between(a.kind, b.kind);
    if shape == SegmentShape::Step {
        return a.value;
    }
    if shape == SegmentShape::Linear {
        return Value::lerp(&a.value, &b.value, t);
    }

    // An inactive side gets a collapsed handle, which degenerates that end
    // of the curve to a straight departure.
    let right = if shape == SegmentShape::RightBezier {
        Handle::collapsed(&a.value)
    } else {
        a.right
    };
    let left = if shape == SegmentShape::LeftBezier {
        Handle::collapsed(&b.value)
    } else {
        b.left
    };

    let y0 = a.value;
    let y3 = b.value;
    let y1 = y0.offset(&right.offset, 1.0);
    let y2 = y3.offset(&left.offset, -1.0);
    let t1 = right.influence;
    let t2 = 1.0 - left.influence;
    bezier::evaluate_segment(&y0, &y1, &y2, &y3, t1, t2, t)
}
