use tracing::debug;

use super::IdMap;
use crate::level::{Level, PathSpline};

/// Append clones of `paths` to `target`, giving each an id unused in the
/// target's shared path id space.
pub fn import_paths<'a>(target: &mut Level, paths: impl IntoIterator<Item = &'a PathSpline>) -> IdMap {
    let mut map = IdMap::new();
    for path in paths {
        let mut clone = path.clone();
        if target.path_id_in_use(clone.id) {
            clone.id = target.first_unused_path_id();
            debug!("path {} renumbered to {}", path.id, clone.id);
        }
        map.insert(path.id, clone.id);
        target.paths.push(clone);
    }
    map
}
