use itertools::Itertools;
use tracing::{debug, warn};

use super::IdMap;
use crate::level::{Level, Model};

/// Result of a texture import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureImport {
    pub map: IdMap,
    pub added: usize,
    pub deduplicated: usize,
}

impl TextureImport {
    pub fn merge(&mut self, other: TextureImport) {
        self.map.extend(&other.map);
        self.added += other.added;
        self.deduplicated += other.deduplicated;
    }
}

/// Bring every texture in `used_ids` over from `source`.
///
/// A texture identical to one already in `target` maps onto it; anything else
/// is deep cloned and appended. Existing target entries are never touched.
/// Ids that do not resolve in `source` stay unmapped.
pub fn import_textures(
    target: &mut Level,
    source: &Level,
    used_ids: impl IntoIterator<Item = i32>,
) -> TextureImport {
    let mut out = TextureImport::default();
    for id in used_ids.into_iter().unique() {
        let Some(texture) = usize::try_from(id).ok().and_then(|i| source.textures.get(i)) else {
            warn!("texture {id} is not in the source texture table, leaving it unmapped");
            continue;
        };

        match target.textures.iter().position(|t| t.is_duplicate_of(texture)) {
            Some(existing) => {
                debug!("texture {id} deduplicated onto target texture {existing}");
                out.map.insert(id, existing as i32);
                out.deduplicated += 1;
            }
            None => {
                target.textures.push(texture.deep_clone());
                let new_id = (target.textures.len() - 1) as i32;
                debug!("texture {id} appended as {new_id}");
                out.map.insert(id, new_id);
                out.added += 1;
            }
        }
    }
    out
}

/// Rewrite a model's texture-config ids through `map`. Unmapped ids are left
/// for the validator to clamp.
pub fn remap_model_textures(model: &mut Model, map: &IdMap) {
    for config in &mut model.texture_configs {
        if let Some(new_id) = map.get(config.texture_id) {
            config.texture_id = new_id;
        }
    }
}
