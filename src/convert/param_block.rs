use tracing::debug;

use crate::level::{Level, ParamBlock};
use crate::level_types::Generation;

/// Clone `block`, zero padding it to `generation`'s minimum length.
/// Blocks already long enough are copied unchanged.
pub fn padded(block: &ParamBlock, generation: Generation) -> ParamBlock {
    let mut data = block.data.clone();
    let min = generation.min_param_block_len();
    if data.len() < min {
        debug!("padding ParamBlock from 0x{:X} to 0x{min:X} bytes", data.len());
        data.resize(min, 0);
    }
    ParamBlock::new(data)
}

/// Pad `block` for `target` and append it. Returns the new trailing index.
pub fn attach(target: &mut Level, block: &ParamBlock) -> u32 {
    let block = padded(block, target.generation);
    target.push_param_block(block)
}
