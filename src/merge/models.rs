use std::collections::HashSet;

use itertools::Itertools;
use rootcause::Report;
use tracing::{debug, info, warn};

use super::textures::{TextureImport, import_textures, remap_model_textures};
use super::{IdMap, MergeConfig, MergeError};
use crate::convert::model_import::{adapt_class_header, adapt_model};
use crate::level::{ClassHeaderEntry, Level};
use crate::level_types::Category;

/// Result of a model import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelImport {
    /// Source model id to the target model id instances must use.
    pub map: IdMap,
    pub added: usize,
    /// Ids served by a model the target already had.
    pub reused: usize,
    /// Source ids that could not be brought over.
    pub failed: Vec<i32>,
    pub textures: TextureImport,
}

/// Import the `category` models listed in `ids` from `source` into `target`.
///
/// A model the target defined under the same id in the same category before
/// this call is reused. Otherwise the source model is adapted to the target
/// generation, deep cloned and appended. When its id is taken by another
/// category sharing the namespace, the first id counting up from 0 that is
/// neither in use nor requested by this batch is assigned instead.
///
/// Moby models also bring their class header row. Textures referenced by
/// imported models are merged through [`import_textures`].
pub fn import_models(
    target: &mut Level,
    source: &Level,
    category: Category,
    ids: impl IntoIterator<Item = i32>,
    config: &MergeConfig,
) -> Result<ModelImport, Report<MergeError>> {
    let ids: Vec<i32> = ids.into_iter().unique().collect();
    if !ids.is_empty() && source.models(category).is_empty() {
        return Err(Report::new(MergeError::MissingModelTable { category }));
    }

    let existing: HashSet<i32> = target.models(category).iter().map(|m| m.id).collect();
    let mut out = ModelImport::default();
    for &id in &ids {
        if existing.contains(&id) {
            debug!("{category} model {id} already present in target, reusing it");
            out.map.insert(id, id);
            out.reused += 1;
            continue;
        }
        if config.special_models.is_protected(id) {
            warn!("{category} model {id} is never imported and the target has no copy of it");
            out.failed.push(id);
            continue;
        }
        let Some(source_model) = source.model(category, id) else {
            warn!("{category} model {id} is not in the source level");
            out.failed.push(id);
            continue;
        };

        let new_id = if target.model_id_in_use(category, id) {
            let Some(free) = target.first_unused_model_id(category, &ids) else {
                return Err(Report::new(MergeError::IdSpaceExhausted { category }));
            };
            info!("{category} model {id} collides in the target namespace, renumbered to {free}");
            free
        } else {
            id
        };

        let header = match source.class_header(id) {
            Some(header) if category.has_behavior() => {
                match adapt_class_header(id, header, target.generation) {
                    Ok(header) => Some(header),
                    Err(err) => {
                        warn!("{category} model {id} skipped: {err}");
                        out.failed.push(id);
                        continue;
                    }
                }
            }
            _ => None,
        };

        let mut model = adapt_model(source_model, target.generation);
        model.id = new_id;

        let pending: Vec<i32> = model
            .texture_ids()
            .filter(|t| !out.textures.map.contains(*t))
            .collect();
        let textures = import_textures(target, source, pending);
        out.textures.merge(textures);
        remap_model_textures(&mut model, &out.textures.map);

        if let Some(header) = header {
            target.class_headers.push(ClassHeaderEntry {
                model_id: new_id,
                header,
            });
        }
        target.models_mut(category).push(model);
        out.map.insert(id, new_id);
        out.added += 1;
    }

    info!(
        "{category} models: {} added, {} reused, {} failed, {} textures added, {} deduplicated",
        out.added,
        out.reused,
        out.failed.len(),
        out.textures.added,
        out.textures.deduplicated
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::level::{ClassHeader, ClassHeaderV1, Model, Texture, TextureConfig};
    use crate::level_types::Generation;

    fn textured(id: i32, generation: Generation, texture_id: i32) -> Model {
        let mut model = Model::new(id, generation);
        model.vertices = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        model.indices = vec![0, 1, 2];
        model.bounds = Vec4::new(0.0, 0.0, 0.0, 1.0);
        model.texture_configs = vec![TextureConfig {
            texture_id,
            shader: 0,
            uv_flags: 0,
        }];
        model
    }

    #[test]
    fn collision_in_shared_namespace_scans_from_zero() {
        let mut target = Level::new(Generation::V2);
        target.models_mut(Category::Shrub).push(Model::new(0, Generation::V2));
        target.models_mut(Category::Shrub).push(Model::new(5, Generation::V2));
        target.models_mut(Category::Moby).push(Model::new(1, Generation::V2));

        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Moby).push(Model::new(5, Generation::V2));

        let import =
            import_models(&mut target, &source, Category::Moby, [5], &MergeConfig::default())
                .unwrap();
        assert_eq!(import.map.get(5), Some(2));
        assert!(target.model(Category::Moby, 2).is_some());
    }

    #[test]
    fn renumbered_model_is_not_mistaken_for_a_target_model() {
        let mut target = Level::new(Generation::V2);
        for id in [0, 1, 5] {
            target.models_mut(Category::Shrub).push(Model::new(id, Generation::V2));
        }

        let mut source = Level::new(Generation::V2);
        for id in [5, 2] {
            let mut model = Model::new(id, Generation::V2);
            model.vertices = vec![id as f32; 3];
            source.models_mut(Category::Moby).push(model);
        }

        let import =
            import_models(&mut target, &source, Category::Moby, [5, 2], &MergeConfig::default())
                .unwrap();
        assert_eq!(import.added, 2);
        assert_eq!(import.reused, 0);
        // 2 is requested by the batch itself, so 5 skips over it.
        assert_eq!(import.map.get(5), Some(3));
        assert_eq!(import.map.get(2), Some(2));
        for (source_id, target_id) in [(5, 3), (2, 2)] {
            assert_eq!(
                target.model(Category::Moby, target_id).unwrap().vertices,
                source.model(Category::Moby, source_id).unwrap().vertices
            );
        }
    }

    #[test]
    fn tie_ids_do_not_collide_with_mobys() {
        let mut target = Level::new(Generation::V2);
        target.models_mut(Category::Moby).push(Model::new(7, Generation::V2));
        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Tie).push(Model::new(7, Generation::V2));

        let import =
            import_models(&mut target, &source, Category::Tie, [7], &MergeConfig::default())
                .unwrap();
        assert_eq!(import.map.get(7), Some(7));
    }

    #[test]
    fn existing_models_stay_byte_identical() {
        let mut target = Level::new(Generation::V2);
        target.textures.push(Texture::new(2, 2, vec![1; 4]));
        target.models_mut(Category::Moby).push(textured(3, Generation::V2, 0));
        let before = target.clone();

        let mut source = Level::new(Generation::V1);
        source.textures.push(Texture::new(2, 2, vec![2; 4]));
        source.models_mut(Category::Moby).push(textured(3, Generation::V1, 0));
        source.models_mut(Category::Moby).push(textured(4, Generation::V1, 0));

        import_models(&mut target, &source, Category::Moby, [3, 4], &MergeConfig::default())
            .unwrap();
        assert_eq!(target.models(Category::Moby)[0], before.models(Category::Moby)[0]);
        assert_eq!(target.textures[0], before.textures[0]);
        // Model 3 was reused, model 4 appended with its texture at index 1.
        assert_eq!(target.models(Category::Moby).len(), 2);
        assert_eq!(target.models(Category::Moby)[1].texture_configs[0].texture_id, 1);
    }

    #[test]
    fn v1_moby_brings_widened_class_header() {
        let mut source = Level::new(Generation::V1);
        source.models_mut(Category::Moby).push(Model::new(1000, Generation::V1));
        source.class_headers.push(ClassHeaderEntry {
            model_id: 1000,
            header: ClassHeader::V1(ClassHeaderV1 {
                slots: [9; 8],
                param_size: 0x10,
                mode_flags: 0,
            }),
        });
        let mut target = Level::new(Generation::V2);

        import_models(&mut target, &source, Category::Moby, [1000], &MergeConfig::default())
            .unwrap();
        let Some(ClassHeader::V2(header)) = target.class_header(1000) else {
            panic!("expected a widened header");
        };
        assert_eq!(header.slots[8], 0);
        assert_eq!(target.model(Category::Moby, 1000).unwrap().generation, Generation::V2);
    }

    #[test]
    fn protected_models_are_never_cloned() {
        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Moby).push(Model::new(0, Generation::V2));
        let mut target = Level::new(Generation::V2);
        let config = MergeConfig::builder()
            .special_models(crate::merge::SpecialModels::builder().player(0).build())
            .build();

        let import = import_models(&mut target, &source, Category::Moby, [0], &config).unwrap();
        assert_eq!(import.failed, vec![0]);
        assert!(target.models(Category::Moby).is_empty());
    }

    #[test]
    fn empty_source_table_aborts() {
        let source = Level::new(Generation::V2);
        let mut target = Level::new(Generation::V2);
        assert!(
            import_models(&mut target, &source, Category::Tie, [1], &MergeConfig::default())
                .is_err()
        );
    }
}
