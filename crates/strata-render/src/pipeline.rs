use strata_core::{StrataError, StrataResult};
use strata_ir::{AnimationEvaluator, EffectFlags, EffectInstance};

use crate::context::RenderContext;
use crate::registry::{EffectArgs, EffectRegistry, RegisteredEffect};

/// Index of the first stage whose output can reach the end of the chain.
///
/// A write-only stage ignores its input, so everything before the last one
/// is dead work. Returns 0 when no stage is write-only.
pub fn first_live_stage<I>(flags: I) -> usize
where
    I: IntoIterator<Item = EffectFlags>,
{
    flags
        .into_iter()
        .enumerate()
        .filter(|(_, f)| f.is_write_only())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0)
}

/// Runs a layer's effect chain over a render context.
pub struct EffectPipeline<'r> {
    registry: &'r EffectRegistry,
    evaluator: AnimationEvaluator,
    elide_dead_stages: bool,
}

impl<'r> EffectPipeline<'r> {
    pub fn new(registry: &'r EffectRegistry, elide_dead_stages: bool) -> Self {
        Self {
            registry,
            evaluator: AnimationEvaluator::new(),
            elide_dead_stages,
        }
    }

    /// Resolve every instance up front so an unknown id aborts before any
    /// stage runs.
    fn resolve(&self, effects: &[EffectInstance]) -> StrataResult<Vec<&'r RegisteredEffect>> {
        effects
            .iter()
            .map(|instance| {
                let entry = self.registry.resolve(&instance.effect_id).ok_or_else(|| {
                    StrataError::configuration(format!("unknown effect '{}'", instance.effect_id))
                })?;
                if !instance.matches(entry.schema()) {
                    return Err(StrataError::configuration(format!(
                        "effect instance '{}' does not match its registered schema",
                        instance.effect_id
                    )));
                }
                Ok(entry)
            })
            .collect()
    }

    fn arguments<'s>(
        &self,
        entry: &'s RegisteredEffect,
        instance: &EffectInstance,
        frame: i64,
    ) -> EffectArgs<'s> {
        let values = instance
            .parameters()
            .iter()
            .map(|p| self.evaluator.value_at(p, frame))
            .collect();
        EffectArgs::new(entry.schema(), values)
    }

    /// Apply `effects` in order to the context's source. On return the result
    /// is the context's source buffer.
    pub fn execute(
        &self,
        ctx: &mut RenderContext<'_>,
        effects: &[EffectInstance],
        frame: i64,
    ) -> StrataResult<()> {
        let resolved = self.resolve(effects)?;
        let start = if self.elide_dead_stages {
            first_live_stage(resolved.iter().map(|e| e.schema().flags))
        } else {
            0
        };
        if start > 0 {
            tracing::debug!(skipped = start, "eliding dead effect stages");
        }

        for (index, (entry, instance)) in resolved.iter().zip(effects).enumerate().skip(start) {
            let args = self.arguments(entry, instance, frame);
            tracing::debug!(stage = index, effect = %instance.effect_id, frame, "applying effect");
            entry.effect().apply(ctx, &args)?;
            ctx.roll_textures();
        }
        Ok(())
    }
}
