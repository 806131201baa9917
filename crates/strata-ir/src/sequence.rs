use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layer::{Layer, LayerId};

/// Unique identifier for a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub Uuid);

impl SequenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stack of layers rendered at a fixed resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
    /// Length in frames.
    pub duration: i64,
    /// Ordered list of layers; index 0 is composited first (bottom).
    pub layers: Vec<Layer>,
}

impl Sequence {
    pub fn new(width: u32, height: u32, frame_rate: f64, duration: i64) -> Self {
        Self {
            id: SequenceId::new(),
            width,
            height,
            frame_rate,
            duration,
            layers: Vec::new(),
        }
    }

    /// Push a layer on top of the stack.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Builder: push a layer on top of the stack.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(index))
    }

    /// Layers covering `frame`, bottom to top.
    pub fn visible_layers(&self, frame: i64) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(move |l| l.is_visible_at(frame))
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.frame_rate > 0.0 {
            self.duration as f64 / self.frame_rate
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Color;

    fn titles<'a>(layers: impl Iterator<Item = &'a Layer>) -> Vec<String> {
        layers.map(|l| l.title.clone()).collect()
    }

    #[test]
    fn test_visible_layers_keep_stack_order() {
        let seq = Sequence::new(100, 100, 30.0, 30)
            .with_layer(Layer::solid("bottom", 0, 30, 100, 100, Color::RED))
            .with_layer(Layer::empty("middle", 10, 20))
            .with_layer(Layer::solid("top", 5, 30, 10, 10, Color::BLUE));

        assert_eq!(titles(seq.visible_layers(0)), vec!["bottom"]);
        assert_eq!(titles(seq.visible_layers(12)), vec!["bottom", "middle", "top"]);
        assert_eq!(titles(seq.visible_layers(20)), vec!["bottom", "top"]);
        assert!(seq.visible_layers(30).next().is_none());
    }

    #[test]
    fn test_get_and_remove_layer() {
        let mut seq = Sequence::new(10, 10, 24.0, 48);
        let layer = Layer::empty("a", 0, 48);
        let id = layer.id;
        seq.add_layer(layer);
        assert_eq!(seq.get_layer(id).unwrap().title, "a");
        seq.get_layer_mut(id).unwrap().title = "b".into();
        assert_eq!(seq.remove_layer(id).unwrap().title, "b");
        assert!(seq.get_layer(id).is_none());
        assert!((seq.duration_seconds() - 2.0).abs() < 1e-12);
    }
}
