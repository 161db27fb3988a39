// ITS detector topology
pub const N_LAYERS: usize = 7;
/// Layers 0-2 form the inner barrel; staves there have no modules or sub-staves
pub const N_INNER_BARREL_LAYERS: usize = 3;

pub const CHIPS_PER_IB_STAVE: usize = 9;
pub const CHIPS_PER_HALF_MODULE: usize = 7;
pub const CHIPS_PER_FULL_MODULE: usize = 2 * CHIPS_PER_HALF_MODULE;
pub const MODULES_PER_MB_STAVE: usize = 8;
pub const MODULES_PER_OB_STAVE: usize = 14;
pub const SUB_STAVES_PER_MB_OB_STAVE: usize = 2;

pub const DATA_LINKS_PER_IB_STAVE: usize = 9;
pub const CTRL_LINKS_PER_IB_STAVE: usize = 1;
pub const DATA_LINKS_PER_HALF_MODULE: usize = 1;
pub const CTRL_LINKS_PER_HALF_MODULE: usize = 1;
pub const DATA_LINKS_PER_FULL_MODULE: usize = 2 * DATA_LINKS_PER_HALF_MODULE;
pub const CTRL_LINKS_PER_FULL_MODULE: usize = 2 * CTRL_LINKS_PER_HALF_MODULE;

pub const STAVES_PER_LAYER: [usize; N_LAYERS] = [12, 16, 20, 24, 30, 42, 48];

// On-wire encoding
/// Chips put only the low 4 bits of their global chip id on the wire
pub const TRUNCATED_CHIP_ID_MASK: u8 = 0xF;
pub const TRUNCATED_CHIP_ID_MODULUS: usize = TRUNCATED_CHIP_ID_MASK as usize + 1;
/// Four u64 fields: busy on/off time and busy on/off trigger id
pub const BUSY_RECORD_SIZE: u64 = 32;
pub const U64_SIZE: u64 = 8;

// File naming
pub const BUSY_FILE_SUFFIX: &str = "busy";
pub const TRIGGER_ACTIONS_FILE_SUFFIX: &str = "trigger_actions";
pub const SETTINGS_FILE_NAME: &str = "settings.yml";
pub const CACHE_FILE_NAME: &str = "decoded_records.yml";
