/// File-backed [`LevelStore`] writing a single sectioned `level.bin`
pub mod blob_store;
/// Shared winnow helpers and the little-endian byte writer
pub mod parser_utils;

use std::path::Path;
use std::path::PathBuf;

use rootcause::Report;
use thiserror::Error;

use crate::level::Level;

pub use blob_store::BlobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {detail}")]
    Io { path: PathBuf, detail: String },
    #[error("not a level file (magic {found:?})")]
    BadMagic { found: [u8; 4] },
    #[error("unknown level generation tag {0}")]
    UnknownGeneration(u32),
    #[error("section {section} is out of bounds")]
    SectionOutOfBounds { section: &'static str },
    #[error("failed to encode section {section}")]
    Encode { section: &'static str },
    #[error("store rejected the operation: {0}")]
    Rejected(String),
}

/// Persistence collaborator for levels.
///
/// `save` takes the level mutably: a store is allowed to clear collections it
/// does not manage itself (paths, occlusion) as a side effect of writing.
pub trait LevelStore {
    fn load(&self, path: &Path) -> Result<Level, Report<StoreError>>;
    fn save(&self, level: &mut Level, directory: &Path) -> Result<(), Report<StoreError>>;
}

/// A [`LevelStore`] backed by a pair of closures.
pub struct LevelStoreWithCallback<L, S> {
    load: L,
    save: S,
}

impl<L, S> LevelStoreWithCallback<L, S>
where
    L: Fn(&Path) -> Result<Level, Report<StoreError>>,
    S: Fn(&mut Level, &Path) -> Result<(), Report<StoreError>>,
{
    pub fn new(load: L, save: S) -> Self {
        Self { load, save }
    }
}

impl<L, S> LevelStore for LevelStoreWithCallback<L, S>
where
    L: Fn(&Path) -> Result<Level, Report<StoreError>>,
    S: Fn(&mut Level, &Path) -> Result<(), Report<StoreError>>,
{
    fn load(&self, path: &Path) -> Result<Level, Report<StoreError>> {
        (self.load)(path)
    }

    fn save(&self, level: &mut Level, directory: &Path) -> Result<(), Report<StoreError>> {
        (self.save)(level, directory)
    }
}
