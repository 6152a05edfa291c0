//! The device catalog: profiles a port can be populated from.

use crate::{CfgSpace, Mld};

/// One device profile, loaded from configuration and immutable while
/// serving. Connecting a profile to a port copies its link parameters and
/// config space, and instantiates its MLD when present.
#[derive(Debug)]
pub struct DeviceEntry {
    pub name: String,
    /// Root ports connect as upstream ports; everything else as downstream.
    pub rootport: bool,
    pub dv: u8,
    pub dt: crate::DevType,
    pub cv: u8,
    pub mlw: u8,
    pub mls: u8,
    pub cfgspace: CfgSpace,
    pub mld: Option<Mld>,
}

impl DeviceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rootport: false,
            dv: crate::dev_version::CXL_2_0,
            dt: crate::DevType::None,
            cv: 0,
            mlw: 16,
            mls: 5,
            cfgspace: CfgSpace::new(),
            mld: None,
        }
    }
}
