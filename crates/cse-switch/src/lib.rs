//! In-memory model of a CXL 2.0 switch.
//!
//! [`CxlSwitch`] is the single source of truth the command handlers read and
//! mutate: physical ports, virtual switches (VCSs) with their virtual
//! bridges (vPPBs), multi-logical devices (MLDs) attached to ports, and the
//! catalog of device profiles that can be hot-plugged by the emulator
//! control API. The model itself is lock-free; the server wraps the one
//! instance it serves in a mutex and holds it across each command.

pub mod device;
pub mod mld;
pub mod port;
pub mod switch;
pub mod vcs;

pub use device::DeviceEntry;
pub use mld::{Granularity, MemSpace, Mld};
pub use port::{CfgSpace, Port, PortState};
pub use switch::{BackgroundOp, CxlSwitch, SwitchError};
pub use vcs::{BindStatus, Vcs, VcsState, Vppb};

pub const MAX_LD: usize = 16;
pub const MAX_PORTS: usize = 256;
pub const MAX_VCSS: usize = 256;
pub const MAX_VPPBS_PER_VCS: usize = 256;
pub const MAX_VPPBS: usize = MAX_PORTS * MAX_LD;

pub const CFG_SPACE_SIZE: usize = 4096;

/// Connected-device CXL versions (`dv`).
pub mod dev_version {
    pub const NOT_CXL: u8 = 0x00;
    pub const CXL_1_1: u8 = 0x01;
    pub const CXL_2_0: u8 = 0x02;
}

/// Connected-device types (`dt`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DevType {
    #[default]
    None = 0x00,
    Pcie = 0x01,
    CxlType1 = 0x02,
    CxlType2 = 0x03,
    CxlType3 = 0x04,
    CxlType3Pooled = 0x05,
}

impl DevType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => DevType::Pcie,
            0x02 => DevType::CxlType1,
            0x03 => DevType::CxlType2,
            0x04 => DevType::CxlType3,
            0x05 => DevType::CxlType3Pooled,
            _ => DevType::None,
        }
    }

    /// Whether a port with this device answers Type-3 memory-device
    /// commands.
    pub fn is_type3(self) -> bool {
        matches!(self, DevType::CxlType3 | DevType::CxlType3Pooled)
    }
}

/// Supported link speed bits (`speeds`).
pub mod link_speed {
    pub const PCIE1: u8 = 0x01;
    pub const PCIE2: u8 = 0x02;
    pub const PCIE3: u8 = 0x04;
    pub const PCIE4: u8 = 0x08;
    pub const PCIE5: u8 = 0x10;
    pub const PCIE6: u8 = 0x20;

    pub const ALL_TO_PCIE5: u8 = PCIE1 | PCIE2 | PCIE3 | PCIE4 | PCIE5;
}

/// LTSSM states (`ltssm`).
pub mod ltssm {
    pub const DETECT: u8 = 0x00;
    pub const L0: u8 = 0x04;
    pub const DISABLED: u8 = 0x08;
}
