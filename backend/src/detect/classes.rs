/// The five lumbar disc levels, top to bottom. Detections are matched to
/// these by vertical rank.
pub const DISC_LEVELS: [&str; 5] = ["L1-L2", "L2-L3", "L3-L4", "L4-L5", "L5-S1"];

pub const CLASS_ID_NORMAL: usize = 0;
pub const CLASS_ID_BULGING: usize = 1;
pub const CLASS_ID_HERNIATION: usize = 2;

pub struct ClassConfig {
    pub name: &'static str,
    pub color: [u8; 3],
    pub severity: &'static str,
}

/// Indexed by model class id; must match the dataset order the weights were
/// trained with.
pub const CLASS_CONFIGS: [ClassConfig; 3] = [
    ClassConfig { name: "Normal", color: [0, 200, 0], severity: "low" },
    ClassConfig { name: "Bulging", color: [255, 200, 0], severity: "moderate" },
    ClassConfig { name: "Herniation", color: [255, 0, 0], severity: "severe" },
];

pub const NUM_CLASSES: usize = CLASS_CONFIGS.len();

const UNKNOWN_CLASS: ClassConfig = ClassConfig {
    name: "Unknown",
    color: [180, 180, 180],
    severity: "unknown",
};

/// Class table lookup with a gray fallback for ids outside the table.
pub fn class_config(class_id: usize) -> &'static ClassConfig {
    CLASS_CONFIGS.get(class_id).unwrap_or(&UNKNOWN_CLASS)
}
