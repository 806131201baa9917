use std::collections::HashSet;
use strata_core::StrataError;

use crate::sequence::Sequence;

/// Check a sequence for structural problems before rendering it.
///
/// All problems are collected rather than stopping at the first.
pub fn validate_sequence(sequence: &Sequence) -> Result<(), Vec<StrataError>> {
    let mut errors = Vec::new();

    if sequence.width == 0 || sequence.height == 0 {
        errors.push(StrataError::data("sequence resolution must be non-zero"));
    }
    if sequence.frame_rate.is_nan() || sequence.frame_rate <= 0.0 {
        errors.push(StrataError::data("sequence frame rate must be positive"));
    }
    if sequence.duration <= 0 {
        errors.push(StrataError::data("sequence duration must be positive"));
    }

    let mut ids = HashSet::new();
    for layer in &sequence.layers {
        if !ids.insert(layer.id) {
            errors.push(StrataError::data(format!("duplicate layer id: {}", layer.id)));
        }
        if layer.start_frame >= layer.end_frame {
            errors.push(StrataError::data(format!(
                "layer '{}' has an empty frame window [{}, {})",
                layer.title, layer.start_frame, layer.end_frame
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
