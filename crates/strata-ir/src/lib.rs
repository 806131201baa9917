//! # strata-ir
//!
//! The sequence model consumed by the renderer: sequences of time-bounded
//! layers, their animatable parameters and keyframes, and effect instances.
//! The [`animation`] module evaluates a parameter at an arbitrary frame.
//!
//! Everything here is plain data. The renderer reads it and never mutates it.

pub mod animation;
pub mod bezier;
pub mod effect;
pub mod keyframe;
pub mod layer;
pub mod parameter;
pub mod sequence;
pub mod validate;

pub use animation::{get_value_at_frame, AnimationEvaluator};
pub use effect::{EffectFlags, EffectInstance, EffectSchema, ParameterSpec};
pub use keyframe::{Handle, Keyframe, KeyframeKind};
pub use layer::{Layer, LayerContent, LayerId};
pub use parameter::Parameter;
pub use sequence::{Sequence, SequenceId};
pub use validate::validate_sequence;
