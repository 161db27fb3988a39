// Chips in the simulated readout put the low 4 bits of their *global* chip id on the wire
// instead of their local chip id within the module. The global id is a linear function of the
// position, so with the layer, stave, sub-stave and module known from the file and data link
// the local id can be recovered. Each layer band has its own offsets because the cumulative
// chip count and the stave/module sizes differ modulo 16 between bands.
use super::constants::{
    DATA_LINKS_PER_IB_STAVE, N_INNER_BARREL_LAYERS, TRUNCATED_CHIP_ID_MASK,
    TRUNCATED_CHIP_ID_MODULUS,
};
use super::error::GeometryError;
use super::geometry::Position;

/// Recover the local chip id (within its module) of a chip from the truncated id it sent.
///
/// The `module_chip_id` of `position` is ignored. The result is always in 0..=15; values the
/// module can't hold are rejected later by the geometry lookup.
pub fn fix_chip_id(
    position: &Position,
    data_link_id: usize,
    truncated_id: u8,
) -> Result<u8, GeometryError> {
    if truncated_id > TRUNCATED_CHIP_ID_MASK {
        return Err(GeometryError::BadTruncatedChipId(truncated_id));
    }
    let truncated = truncated_id as usize;
    let module_offset = 2 * position.module_id;

    let fixed = match position.layer_id {
        layer if layer < N_INNER_BARREL_LAYERS => {
            // One chip per link on the inner barrel
            if data_link_id >= DATA_LINKS_PER_IB_STAVE {
                return Err(GeometryError::BadDataLink {
                    layer,
                    link: data_link_id,
                    max: DATA_LINKS_PER_IB_STAVE,
                });
            }
            data_link_id
        }
        3 | 4 => truncated + module_offset + 8 * position.sub_stave_id,
        5 => truncated + module_offset + 14 * position.sub_stave_id + 28 * position.stave_id,
        6 => truncated + module_offset + 14 * position.sub_stave_id + 28 * position.stave_id + 8,
        layer => return Err(GeometryError::BadLayer(layer)),
    };

    Ok((fixed % TRUNCATED_CHIP_ID_MODULUS) as u8)
}

/// Copy of `position` with its `module_chip_id` replaced by the recovered chip id
pub fn repair_position(
    position: &Position,
    data_link_id: usize,
    truncated_id: u8,
) -> Result<Position, GeometryError> {
    let module_chip_id = fix_chip_id(position, data_link_id, truncated_id)? as usize;
    Ok(Position {
        module_chip_id,
        ..*position
    })
}
