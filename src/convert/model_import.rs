//! Generation adaptation of models and class headers on import.
//!
//! Which case applies depends on the generation the model itself was written
//! for, not on the instance it is attached to:
//!
//! - V1 models have a narrow class header that is widened, and their class
//!   parameter size is recomputed for the V2 ParamBlock minimum.
//! - V2 and V3 models are deep cloned unchanged, apart from the animation
//!   table whose entry layout differs between the two.

use rootcause::prelude::*;
use tracing::warn;

use super::ConvertError;
use crate::codec::class_header;
use crate::level::{AnimationEntry, ClassHeader, Model};
use crate::level_types::Generation;

/// Deep clone `model` into `target`'s representation.
pub fn adapt_model(model: &Model, target: Generation) -> Model {
    let mut out = model.clone();
    out.generation = target;
    out.animations = adapt_animations(model, target);
    if out.bounds.w <= 0.0 && !out.vertices.is_empty() {
        out.bounds = out.compute_bounds();
    }
    out
}

fn adapt_animations(model: &Model, target: Generation) -> Vec<AnimationEntry> {
    match target {
        Generation::V1 => {
            if !model.animations.is_empty() {
                warn!(
                    "model {} loses {} animations, V1 has no animation table",
                    model.id,
                    model.animations.len()
                );
            }
            Vec::new()
        }
        Generation::V2 => model
            .animations
            .iter()
            .map(|a| AnimationEntry { sound: None, ..*a })
            .collect(),
        Generation::V3 => model
            .animations
            .iter()
            .map(|a| AnimationEntry {
                sound: a.sound.or(Some(-1)),
                ..*a
            })
            .collect(),
    }
}

/// Bring a class header into `target`'s layout.
pub fn adapt_class_header(
    model_id: i32,
    header: &ClassHeader,
    target: Generation,
) -> Result<ClassHeader, Report<ConvertError>> {
    class_header::to_generation(header, target).context(ConvertError::ClassHeader { model_id })
}
