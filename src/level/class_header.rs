pub const V1_SLOT_COUNT: usize = 8;
pub const V2_SLOT_COUNT: usize = 9;

/// Behavior dispatch table of an object class, V1 layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassHeaderV1 {
    pub slots: [u32; V1_SLOT_COUNT],
    /// Size of the ParamBlock instances of this class expect.
    pub param_size: u32,
    pub mode_flags: u32,
}

/// Behavior dispatch table of an object class, V2/V3 layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassHeaderV2 {
    pub slots: [u32; V2_SLOT_COUNT],
    pub collision_ptr: u32,
    pub param_size: u32,
    pub mode_flags: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassHeader {
    V1(ClassHeaderV1),
    V2(ClassHeaderV2),
}

/// A class header table row: the header of one moby model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassHeaderEntry {
    pub model_id: i32,
    pub header: ClassHeader,
}
