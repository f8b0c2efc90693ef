//! Single-file level container.
//!
//! ```text
//! +0x00 "LVLP"
//! +0x04 u32 generation tag
//! +0x08 u32 section_count
//! +0x0C section_count x (u32 tag, u32 offset, u32 len)
//!       section payloads, each 4 byte aligned
//! ```
//!
//! Every section except occlusion is a count-prefixed record table. The
//! skybox section holds zero or one model record.

use std::path::Path;

use rootcause::prelude::*;
use tracing::{info, warn};
use winnow::Parser;
use winnow::binary::le_u32;
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};

use super::parser_utils::{ByteWriter, align4};
use super::{LevelStore, StoreError};
use crate::codec::table::{decode_table, encode_table};
use crate::codec::{CodecError, DecodeStats, class_header, layouts, model, occlusion, path, texture};
use crate::level::{ClassHeaderEntry, Level, ParamBlock};
use crate::level_types::{Category, Generation};
use crate::recognized::Recognized;
use crate::spatial::reconcile_lengths;

pub const LEVEL_FILE_NAME: &str = "level.bin";
pub const MAGIC: [u8; 4] = *b"LVLP";
const HEADER_SIZE: usize = 0x0C;
const SECTION_ENTRY_SIZE: usize = 0x0C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Instances(Category),
    Models(Category),
    Textures,
    ParamBlocks,
    ClassHeaders,
    Occlusion,
    Paths,
    Skybox,
}

impl Section {
    const ALL: [Section; 12] = [
        Section::Instances(Category::Moby),
        Section::Instances(Category::Tie),
        Section::Instances(Category::Shrub),
        Section::Models(Category::Moby),
        Section::Models(Category::Tie),
        Section::Models(Category::Shrub),
        Section::Textures,
        Section::ParamBlocks,
        Section::ClassHeaders,
        Section::Occlusion,
        Section::Paths,
        Section::Skybox,
    ];

    fn tag(self) -> u32 {
        match self {
            Section::Instances(c) => 1 + c.index() as u32,
            Section::Models(c) => 4 + c.index() as u32,
            Section::Textures => 7,
            Section::ParamBlocks => 8,
            Section::ClassHeaders => 9,
            Section::Occlusion => 10,
            Section::Paths => 11,
            Section::Skybox => 12,
        }
    }

    fn from_tag(tag: u32) -> Recognized<Section, u32> {
        Section::ALL
            .into_iter()
            .find(|s| s.tag() == tag)
            .map(Recognized::Known)
            .unwrap_or(Recognized::Unknown(tag))
    }

    fn name(self) -> &'static str {
        match self {
            Section::Instances(Category::Moby) => "moby instances",
            Section::Instances(Category::Tie) => "tie instances",
            Section::Instances(Category::Shrub) => "shrub instances",
            Section::Models(Category::Moby) => "moby models",
            Section::Models(Category::Tie) => "tie models",
            Section::Models(Category::Shrub) => "shrub models",
            Section::Textures => "textures",
            Section::ParamBlocks => "param blocks",
            Section::ClassHeaders => "class headers",
            Section::Occlusion => "occlusion",
            Section::Paths => "paths",
            Section::Skybox => "skybox",
        }
    }
}

/// Stores a level as `<directory>/level.bin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobStore;

impl BlobStore {
    pub fn new() -> Self {
        Self
    }

    /// Decode a level container. Malformed records, and sections whose framing
    /// is broken, are skipped and counted; the collection they would have
    /// filled stays empty. Only a bad header fails the load.
    pub fn read_level(&self, data: &[u8]) -> Result<(Level, DecodeStats), Report<StoreError>> {
        let input = &mut &data[..];
        let (magic, generation_tag, section_count) = (le_u32, le_u32, le_u32)
            .parse_next(input)
            .map_err(|_: ErrMode<ContextError>| StoreError::BadMagic { found: [0; 4] })?;

        let found = magic.to_le_bytes();
        if found != MAGIC {
            return Err(Report::new(StoreError::BadMagic { found }));
        }
        let generation = Generation::from_tag(generation_tag)
            .ok_or_else(StoreError::UnknownGeneration)?;

        let entries: Vec<(u32, u32, u32)> = repeat(section_count as usize, (le_u32, le_u32, le_u32))
            .parse_next(input)
            .map_err(|_: ErrMode<ContextError>| StoreError::SectionOutOfBounds {
                section: "section directory",
            })?;

        let mut level = Level::new(generation);
        let mut stats = DecodeStats::default();
        for (tag, offset, len) in entries {
            let section = match Section::from_tag(tag) {
                Recognized::Known(section) => section,
                Recognized::Unknown(raw) => {
                    warn!("skipping unknown level section tag {raw}");
                    continue;
                }
            };
            let start = offset as usize;
            let Some(bytes) = start
                .checked_add(len as usize)
                .and_then(|end| data.get(start..end))
            else {
                warn!(
                    "skipping {} section: 0x{len:X} bytes at 0x{offset:X} run past the end of the file",
                    section.name()
                );
                stats.skipped += 1;
                continue;
            };
            match read_section(&mut level, section, bytes) {
                Ok(section_stats) => stats.merge(section_stats),
                Err(err) => {
                    warn!("skipping {} section: {err}", section.name());
                    stats.skipped += 1;
                }
            }
        }

        if stats.skipped > 0 {
            warn!(
                "level decoded with {} of {} records skipped",
                stats.skipped,
                stats.decoded + stats.skipped
            );
        }
        Ok((level, stats))
    }

    /// Encode `level` in its own generation's layouts.
    pub fn write_level(&self, level: &Level) -> Result<Vec<u8>, Report<StoreError>> {
        let mut payloads = Vec::with_capacity(Section::ALL.len());
        for section in Section::ALL {
            let payload = write_section(level, section).context(StoreError::Encode {
                section: section.name(),
            })?;
            payloads.push((section, payload));
        }

        let mut w = ByteWriter::new();
        w.put_bytes(&MAGIC);
        w.put_u32(level.generation.tag());
        w.put_u32(payloads.len() as u32);

        let mut offset = HEADER_SIZE + payloads.len() * SECTION_ENTRY_SIZE;
        for (section, payload) in &payloads {
            w.put_u32(section.tag());
            w.put_u32(offset as u32);
            w.put_u32(payload.len() as u32);
            offset += align4(payload.len());
        }
        for (_, payload) in &payloads {
            w.put_bytes(payload);
            w.pad4();
        }
        Ok(w.into_inner())
    }
}

fn read_section(
    level: &mut Level,
    section: Section,
    bytes: &[u8],
) -> Result<DecodeStats, Report<CodecError>> {
    let generation = level.generation;
    let stats = match section {
        Section::Instances(category) => {
            let layout = layouts::instance_layout(generation, category);
            let (instances, stats) = decode_table(bytes, section.name(), |record| {
                Ok(layouts::decode_instance(record, layout).map_err(CodecError::from)?)
            })?;
            *level.instances_mut(category) = instances;
            stats
        }
        Section::Models(category) => {
            let (models, stats) = decode_table(bytes, section.name(), |record| {
                Ok(model::decode_model(record, generation)?.0)
            })?;
            *level.models_mut(category) = models;
            stats
        }
        Section::Textures => {
            let (textures, stats) = decode_table(bytes, section.name(), |record| {
                Ok(texture::decode_texture(record)?.0)
            })?;
            level.textures = textures;
            stats
        }
        Section::ParamBlocks => {
            let (blocks, stats) = decode_table(bytes, section.name(), |record| {
                Ok(ParamBlock::new(record.to_vec()))
            })?;
            level.param_blocks = blocks;
            stats
        }
        Section::ClassHeaders => {
            let (headers, stats) = decode_table(bytes, section.name(), |record| {
                let id_bytes: [u8; 4] = record
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(CodecError::DataTooShort {
                        what: "class header row",
                        need: 4,
                        have: record.len(),
                    })?;
                Ok(ClassHeaderEntry {
                    model_id: i32::from_le_bytes(id_bytes),
                    header: class_header::decode_class_header(&record[4..], generation)?,
                })
            })?;
            level.class_headers = headers;
            stats
        }
        Section::Occlusion => {
            level.occlusion = occlusion::decode_occlusion(bytes)?;
            DecodeStats {
                decoded: 1,
                skipped: 0,
            }
        }
        Section::Paths => {
            let (paths, stats) = decode_table(bytes, section.name(), |record| {
                Ok(path::decode_path(record)?.0)
            })?;
            level.paths = paths;
            stats
        }
        Section::Skybox => {
            let (mut models, stats) = decode_table(bytes, section.name(), |record| {
                Ok(model::decode_model(record, generation)?.0)
            })?;
            level.skybox = models.pop();
            stats
        }
    };
    Ok(stats)
}

fn write_section(level: &Level, section: Section) -> Result<Vec<u8>, Report<CodecError>> {
    let generation = level.generation;
    Ok(match section {
        Section::Instances(category) => {
            let layout = layouts::instance_layout(generation, category);
            encode_table(
                level
                    .instances(category)
                    .iter()
                    .map(|inst| layouts::encode_instance(inst, layout)),
            )
        }
        Section::Models(category) => encode_table(
            level
                .models(category)
                .iter()
                .map(|m| model::encode_model(m, generation))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Section::Textures => encode_table(level.textures.iter().map(texture::encode_texture)),
        Section::ParamBlocks => encode_table(level.param_blocks.iter().map(|b| &b.data)),
        Section::ClassHeaders => {
            let mut rows = Vec::with_capacity(level.class_headers.len());
            for entry in &level.class_headers {
                let mut row = entry.model_id.to_le_bytes().to_vec();
                row.extend(class_header::encode_class_header(&entry.header, generation)?);
                rows.push(row);
            }
            encode_table(rows)
        }
        Section::Occlusion => occlusion::encode_occlusion(&level.occlusion),
        Section::Paths => encode_table(
            level
                .paths
                .iter()
                .map(path::encode_path)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Section::Skybox => encode_table(
            level
                .skybox
                .iter()
                .map(|m| model::encode_model(m, generation))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

impl LevelStore for BlobStore {
    fn load(&self, path: &Path) -> Result<Level, Report<StoreError>> {
        let file = if path.is_dir() {
            path.join(LEVEL_FILE_NAME)
        } else {
            path.to_path_buf()
        };
        let data = std::fs::read(&file).map_err(|e| StoreError::Io {
            path: file.clone(),
            detail: e.to_string(),
        })?;
        let (level, stats) = self.read_level(&data)?;
        info!(
            "loaded {} level from {} ({} records)",
            level.generation,
            file.display(),
            stats.decoded
        );
        Ok(level)
    }

    fn save(&self, level: &mut Level, directory: &Path) -> Result<(), Report<StoreError>> {
        reconcile_lengths(level);
        let bytes = self.write_level(level)?;
        std::fs::create_dir_all(directory).map_err(|e| StoreError::Io {
            path: directory.to_path_buf(),
            detail: e.to_string(),
        })?;
        let file = directory.join(LEVEL_FILE_NAME);
        std::fs::write(&file, bytes).map_err(|e| StoreError::Io {
            path: file.clone(),
            detail: e.to_string(),
        })?;
        info!("saved {} level to {}", level.generation, file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::level::{
        ClassHeader, ClassHeaderV2, Instance, Model, OcclusionEntry, OcclusionTable, PathKind,
        PathSpline, Texture, Transform,
    };

    fn sample_level() -> Level {
        let mut level = Level::new(Generation::V2);
        let mut model = Model::new(1000, Generation::V2);
        model.vertices = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        model.indices = vec![0, 1];
        level.models_mut(Category::Moby).push(model);
        level.instances_mut(Category::Moby).push(Instance {
            uid: 7,
            model_id: 1000,
            param_index: Some(0),
            class_index: Some(0),
            transform: Transform {
                position: Vec3::new(1.0, 2.0, 3.0),
                ..Transform::default()
            },
            ..Instance::default()
        });
        level.param_blocks.push(ParamBlock::new(vec![1; 0x80]));
        level.class_headers.push(ClassHeaderEntry {
            model_id: 1000,
            header: ClassHeader::V2(ClassHeaderV2::default()),
        });
        level.textures.push(Texture::new(2, 2, vec![9; 4]));
        level.occlusion = OcclusionTable::new(
            vec![OcclusionEntry {
                spatial_hash: 5,
                visibility: 1,
            }],
            vec![],
            vec![],
        );
        level.paths.push(PathSpline {
            id: 3,
            kind: PathKind::CameraRail,
            points: vec![Vec4::ONE],
        });
        level.skybox = Some(Model::new(1, Generation::V2));
        level
    }

    #[test]
    fn container_round_trip() {
        let level = sample_level();
        let store = BlobStore::new();
        let bytes = store.write_level(&level).unwrap();
        assert_eq!(&bytes[..4], b"LVLP");
        let (decoded, stats) = store.read_level(&bytes).unwrap();
        assert_eq!(stats.skipped, 0);
        assert_eq!(decoded, level);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = BlobStore.write_level(&sample_level()).unwrap();
        bytes[0] = b'X';
        assert!(BlobStore.read_level(&bytes).is_err());
    }

    #[test]
    fn unknown_generation_is_rejected() {
        let mut bytes = BlobStore.write_level(&sample_level()).unwrap();
        bytes[4] = 9;
        assert!(BlobStore.read_level(&bytes).is_err());
    }

    fn section_offset(bytes: &[u8], section: Section) -> usize {
        let word = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        (0..word(8) as usize)
            .map(|i| HEADER_SIZE + i * SECTION_ENTRY_SIZE)
            .find(|at| word(*at) == section.tag())
            .unwrap()
    }

    #[test]
    fn corrupt_occlusion_section_is_skipped() {
        let level = sample_level();
        let mut bytes = BlobStore.write_level(&level).unwrap();
        let entry = section_offset(&bytes, Section::Occlusion);
        let payload = u32::from_le_bytes(bytes[entry + 4..entry + 8].try_into().unwrap()) as usize;
        bytes[payload..payload + 4].copy_from_slice(&(-3i32).to_le_bytes());

        let (decoded, stats) = BlobStore.read_level(&bytes).unwrap();
        assert_eq!(stats.skipped, 1);
        let mut expected = level;
        expected.occlusion = OcclusionTable::default();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn section_past_end_of_file_is_skipped() {
        let level = sample_level();
        let mut bytes = BlobStore.write_level(&level).unwrap();
        let entry = section_offset(&bytes, Section::Textures);
        bytes[entry + 8..entry + 12].copy_from_slice(&u32::MAX.to_le_bytes());

        let (decoded, stats) = BlobStore.read_level(&bytes).unwrap();
        assert_eq!(stats.skipped, 1);
        assert!(decoded.textures.is_empty());
        assert_eq!(decoded.instances(Category::Moby), level.instances(Category::Moby));
    }

    #[test]
    fn save_aligns_occlusion_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = sample_level();
        level.instances_mut(Category::Moby).push(Instance::default());
        BlobStore.save(&mut level, dir.path()).unwrap();
        assert!(level.occlusion_aligned(Category::Moby));

        let loaded = BlobStore.load(dir.path()).unwrap();
        assert_eq!(loaded.occlusion.list(Category::Moby).len(), 2);
    }

    #[test]
    fn save_then_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = sample_level();
        BlobStore.save(&mut level, dir.path()).unwrap();
        assert!(dir.path().join(LEVEL_FILE_NAME).exists());
        let loaded = BlobStore.load(dir.path()).unwrap();
        assert_eq!(loaded, level);
    }

    #[test]
    fn v1_level_cannot_hold_animated_models() {
        let mut level = Level::new(Generation::V1);
        let mut model = Model::new(5, Generation::V1);
        model.animations.push(crate::level::AnimationEntry {
            frame_count: 1,
            flags: 0,
            speed: 1.0,
            sound: None,
        });
        level.models_mut(Category::Tie).push(model);
        assert!(BlobStore.write_level(&level).is_err());
    }
}
