//! YAML configuration: the device catalog, switch identity, per-port
//! overrides, and VCS layout.
//!
//! The document has five sections. `emulator` configures the process
//! (listen port, backing-file directory); the rest overlay a freshly
//! constructed model:
//!
//! ```yaml
//! emulator:
//!   tcp-port: 2508
//!   dir: /tmp/cse
//! devices:
//!   mld_5x8_2.0_4G:
//!     did: 3
//!     port: { dv: 2, dt: 5, cv: 1, mlw: 8, mls: 5 }
//!     pcicfg: { vendor: 0x1AF4, device: 0x1110, baseclass: 0x05 }
//!     mld:
//!       memory_size: 0x100000000
//!       num: 4
//!       granularity: 0
//!       rng1: [0, 4, 8, 12]
//!       rng2: [3, 7, 11, 15]
//!       mmap: 1
//! switch:
//!   num_ports: 32
//!   num_vcss: 4
//! ports:
//!   1: { device: mld_5x8_2.0_4G }
//! vcss:
//!   0:
//!     state: 1
//!     uspid: 0
//!     num_vppb: 8
//!     vppbs:
//!       1: { bind_status: 2, ppid: 1, ldid: 0 }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use cse_switch::{
    CxlSwitch, DevType, DeviceEntry, Granularity, Mld, PortState, VcsState, ltssm, BindStatus,
    MAX_LD,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn default_num_ports() -> usize {
    32
}

fn default_num_vcss() -> usize {
    32
}

fn default_num_vppbs() -> usize {
    256
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub emulator: EmulatorSection,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceSection>,
    #[serde(default)]
    pub switch: SwitchSection,
    #[serde(default)]
    pub ports: BTreeMap<u8, PortSection>,
    #[serde(default)]
    pub vcss: BTreeMap<u8, VcsSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulatorSection {
    #[serde(rename = "tcp-port")]
    pub tcp_port: Option<u16>,
    #[serde(rename = "tcp-address")]
    pub tcp_address: Option<IpAddr>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchSection {
    pub version: Option<u8>,
    pub vid: Option<u16>,
    pub did: Option<u16>,
    pub svid: Option<u16>,
    pub ssid: Option<u16>,
    pub sn: Option<u64>,
    pub max_msg_size_n: Option<u8>,
    pub msg_rsp_limit_n: Option<u8>,
    pub ingress_port: Option<u8>,
    #[serde(default = "default_num_ports")]
    pub num_ports: usize,
    #[serde(default = "default_num_vcss")]
    pub num_vcss: usize,
    #[serde(default = "default_num_vppbs")]
    pub num_vppbs: usize,
    pub num_decoders: Option<u8>,
    pub mlw: Option<u8>,
    pub speeds: Option<u8>,
    pub mls: Option<u8>,
}

impl Default for SwitchSection {
    fn default() -> Self {
        Self {
            version: None,
            vid: None,
            did: None,
            svid: None,
            ssid: None,
            sn: None,
            max_msg_size_n: None,
            msg_rsp_limit_n: None,
            ingress_port: None,
            num_ports: default_num_ports(),
            num_vcss: default_num_vcss(),
            num_vppbs: default_num_vppbs(),
            num_decoders: None,
            mlw: None,
            speeds: None,
            mls: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    pub did: u8,
    #[serde(default)]
    pub port: DevicePortSection,
    #[serde(default)]
    pub pcicfg: Option<PciCfgSection>,
    #[serde(default)]
    pub mld: Option<MldSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevicePortSection {
    pub dv: Option<u8>,
    pub dt: Option<u8>,
    pub cv: Option<u8>,
    pub mlw: Option<u8>,
    pub mls: Option<u8>,
    pub rootport: Option<u8>,
}

/// Standard type-0 configuration header fields, written at their fixed
/// offsets into the 4 KiB template, plus optional capability lists.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PciCfgSection {
    pub vendor: Option<u16>,
    pub device: Option<u16>,
    pub command: Option<u16>,
    pub status: Option<u16>,
    pub revid: Option<u8>,
    pub pi: Option<u8>,
    pub subclass: Option<u8>,
    pub baseclass: Option<u8>,
    pub cacheline: Option<u8>,
    pub r#type: Option<u8>,
    pub subvendor: Option<u16>,
    pub subsystem: Option<u16>,
    pub intline: Option<u8>,
    pub intpin: Option<u8>,
    /// Standard capabilities: id -> body bytes (after the 2-byte header).
    /// Laid out back to back from offset 0x40, linked through 0x34.
    #[serde(default)]
    pub cap: BTreeMap<u8, Vec<u8>>,
    /// Extended capabilities: id -> { ver, data }, laid out from 0x100.
    #[serde(default)]
    pub ecap: BTreeMap<u16, EcapSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcapSection {
    #[serde(default)]
    pub ver: u8,
    #[serde(default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MldSection {
    pub memory_size: Option<u64>,
    pub num: Option<u16>,
    pub epc: Option<u8>,
    pub ttr: Option<u8>,
    pub granularity: Option<u8>,
    pub epc_en: Option<u8>,
    pub ttr_en: Option<u8>,
    pub egress_mod_pcnt: Option<u8>,
    pub egress_sev_pcnt: Option<u8>,
    pub sample_interval: Option<u8>,
    pub rcb: Option<u16>,
    pub comp_interval: Option<u8>,
    pub bp_avg_pcnt: Option<u8>,
    #[serde(default)]
    pub rng1: Vec<u64>,
    #[serde(default)]
    pub rng2: Vec<u64>,
    #[serde(default)]
    pub alloc_bw: Vec<u8>,
    #[serde(default)]
    pub bw_limit: Vec<u8>,
    pub mmap: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSection {
    pub device: Option<String>,
    pub mlw: Option<u8>,
    pub mls: Option<u8>,
    pub state: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VcsSection {
    pub state: Option<u8>,
    pub uspid: Option<u8>,
    pub num_vppb: Option<u16>,
    #[serde(default)]
    pub vppbs: BTreeMap<u8, VppbSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VppbSection {
    pub bind_status: Option<u8>,
    pub ppid: Option<u8>,
    pub ldid: Option<u16>,
}

/// Runtime settings that belong to the process, not the model.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub tcp_port: u16,
    pub tcp_address: IpAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tcp_port: 2508,
            tcp_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// Parse `path` and build the initial model from it.
pub fn load(path: &Path) -> Result<(CxlSwitch, ServerSettings), ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Document = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(build(doc))
}

/// Build the model and server settings from a parsed document.
pub fn build(doc: Document) -> (CxlSwitch, ServerSettings) {
    let mut settings = ServerSettings::default();
    if let Some(port) = doc.emulator.tcp_port {
        settings.tcp_port = port;
    }
    if let Some(addr) = doc.emulator.tcp_address {
        settings.tcp_address = addr;
    }

    let mut switch = CxlSwitch::new(
        doc.switch.num_ports,
        doc.switch.num_vcss,
        doc.switch.num_vppbs,
    );
    switch.dir = doc.emulator.dir;

    apply_switch(&mut switch, &doc.switch);
    apply_devices(&mut switch, &doc.devices);
    apply_ports(&mut switch, &doc.ports);
    apply_vcss(&mut switch, &doc.vcss);
    connect_named_ports(&mut switch);

    (switch, settings)
}

fn apply_switch(switch: &mut CxlSwitch, section: &SwitchSection) {
    if let Some(v) = section.version {
        switch.version = v;
    }
    if let Some(v) = section.vid {
        switch.vid = v;
    }
    if let Some(v) = section.did {
        switch.did = v;
    }
    if let Some(v) = section.svid {
        switch.svid = v;
    }
    if let Some(v) = section.ssid {
        switch.ssid = v;
    }
    if let Some(v) = section.sn {
        switch.sn = v;
    }
    if let Some(v) = section.max_msg_size_n {
        switch.max_msg_size_n = v;
    }
    if let Some(v) = section.msg_rsp_limit_n {
        // The wire command enforces 8..=20; a configured value obeys the
        // same bounds.
        switch.msg_rsp_limit_n = v.clamp(8, 20);
    }
    if let Some(v) = section.ingress_port {
        switch.ingress_port = v;
    }
    if let Some(v) = section.num_decoders {
        switch.num_decoders = v;
    }
    if let Some(v) = section.mlw {
        switch.default_mlw = v;
    }
    if let Some(v) = section.speeds {
        switch.default_speeds = v;
    }
    if let Some(v) = section.mls {
        switch.default_mls = v;
    }
}

fn apply_devices(switch: &mut CxlSwitch, devices: &BTreeMap<String, DeviceSection>) {
    for (name, section) in devices {
        let mut entry = DeviceEntry::new(name.clone());
        if let Some(dv) = section.port.dv {
            entry.dv = dv;
        }
        if let Some(dt) = section.port.dt {
            entry.dt = DevType::from_raw(dt);
        }
        if let Some(cv) = section.port.cv {
            entry.cv = cv;
        }
        if let Some(mlw) = section.port.mlw {
            entry.mlw = mlw;
        }
        if let Some(mls) = section.port.mls {
            entry.mls = mls;
        }
        entry.rootport = section.port.rootport == Some(1);
        if let Some(pcicfg) = &section.pcicfg {
            apply_pcicfg(&mut entry, pcicfg);
        }
        if let Some(mld) = &section.mld {
            entry.mld = Some(build_mld(mld));
        }
        info!(devid = section.did, name = %name, "catalog device");
        switch.set_device(section.did, entry);
    }
}

fn apply_pcicfg(entry: &mut DeviceEntry, cfg: &PciCfgSection) {
    let bytes = entry.cfgspace.as_bytes_mut();
    let mut put16 = |at: usize, v: Option<u16>| {
        if let Some(v) = v {
            bytes[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
    };
    put16(0x00, cfg.vendor);
    put16(0x02, cfg.device);
    put16(0x04, cfg.command);
    put16(0x06, cfg.status);
    put16(0x2C, cfg.subvendor);
    put16(0x2E, cfg.subsystem);
    let mut put8 = |at: usize, v: Option<u8>| {
        if let Some(v) = v {
            bytes[at] = v;
        }
    };
    put8(0x08, cfg.revid);
    put8(0x09, cfg.pi);
    put8(0x0A, cfg.subclass);
    put8(0x0B, cfg.baseclass);
    put8(0x0C, cfg.cacheline);
    put8(0x0E, cfg.r#type);
    put8(0x3C, cfg.intline);
    put8(0x3D, cfg.intpin);

    apply_caps(bytes, &cfg.cap);
    apply_ecaps(bytes, &cfg.ecap);
}

/// Lay standard capabilities back to back from 0x40, chaining the next
/// pointers and anchoring the list at the capabilities pointer (0x34).
fn apply_caps(bytes: &mut [u8; cse_switch::CFG_SPACE_SIZE], caps: &BTreeMap<u8, Vec<u8>>) {
    let mut at = 0x40usize;
    let mut prev_next: Option<usize> = None;
    for (&id, body) in caps {
        if at + 2 + body.len() > 0x100 {
            warn!(cap = id, "capability list overflows the standard space");
            break;
        }
        match prev_next {
            None => bytes[0x34] = at as u8,
            Some(link) => bytes[link] = at as u8,
        }
        bytes[at] = id;
        bytes[at + 1] = 0;
        bytes[at + 2..at + 2 + body.len()].copy_from_slice(body);
        prev_next = Some(at + 1);
        at += 2 + body.len();
    }
}

/// Lay extended capabilities from 0x100. The 4-byte header packs
/// id[15:0], ver[19:16], and next[31:20].
fn apply_ecaps(
    bytes: &mut [u8; cse_switch::CFG_SPACE_SIZE],
    ecaps: &BTreeMap<u16, EcapSection>,
) {
    let mut at = 0x100usize;
    let mut prev_hdr: Option<usize> = None;
    for (&id, ecap) in ecaps {
        if at + 4 + ecap.data.len() > cse_switch::CFG_SPACE_SIZE {
            warn!(ecap = id, "extended capability list overflows config space");
            break;
        }
        if let Some(prev) = prev_hdr {
            let mut hdr = u32::from_le_bytes([
                bytes[prev],
                bytes[prev + 1],
                bytes[prev + 2],
                bytes[prev + 3],
            ]);
            hdr |= (at as u32) << 20;
            bytes[prev..prev + 4].copy_from_slice(&hdr.to_le_bytes());
        }
        let hdr = u32::from(id) | (u32::from(ecap.ver & 0x0F) << 16);
        bytes[at..at + 4].copy_from_slice(&hdr.to_le_bytes());
        bytes[at + 4..at + 4 + ecap.data.len()].copy_from_slice(&ecap.data);
        prev_hdr = Some(at);
        at += 4 + ecap.data.len();
    }
}

fn build_mld(section: &MldSection) -> Mld {
    let mut mld = Mld::new(section.num.unwrap_or(1));
    if let Some(v) = section.memory_size {
        mld.memory_size = v;
    }
    if let Some(v) = section.epc {
        mld.epc = v;
    }
    if let Some(v) = section.ttr {
        mld.ttr = v;
    }
    if let Some(v) = section.granularity {
        mld.granularity = Granularity::from_raw(v);
    }
    if let Some(v) = section.epc_en {
        mld.epc_en = v;
    }
    if let Some(v) = section.ttr_en {
        mld.ttr_en = v;
    }
    if let Some(v) = section.egress_mod_pcnt {
        mld.egress_mod_pcnt = v;
    }
    if let Some(v) = section.egress_sev_pcnt {
        mld.egress_sev_pcnt = v;
    }
    if let Some(v) = section.sample_interval {
        mld.sample_interval = v;
    }
    if let Some(v) = section.rcb {
        mld.rcb = v;
    }
    if let Some(v) = section.comp_interval {
        mld.comp_interval = v;
    }
    if let Some(v) = section.bp_avg_pcnt {
        mld.bp_avg_pcnt = v;
    }
    for (i, v) in section.rng1.iter().take(MAX_LD).enumerate() {
        mld.rng1[i] = *v;
    }
    for (i, v) in section.rng2.iter().take(MAX_LD).enumerate() {
        mld.rng2[i] = *v;
    }
    for (i, v) in section.alloc_bw.iter().take(MAX_LD).enumerate() {
        mld.alloc_bw[i] = *v;
    }
    for (i, v) in section.bw_limit.iter().take(MAX_LD).enumerate() {
        mld.bw_limit[i] = *v;
    }
    mld.want_mmap = section.mmap == Some(1);
    mld
}

fn apply_ports(switch: &mut CxlSwitch, ports: &BTreeMap<u8, PortSection>) {
    // Loader defaults first: configured switches present every port as an
    // active downstream port unless a section says otherwise.
    let (mlw, mls, speeds) = (
        switch.default_mlw,
        switch.default_mls,
        switch.default_speeds,
    );
    for port in &mut switch.ports {
        port.state = PortState::Dsp;
        port.mlw = mlw;
        port.mls = mls;
        port.speeds = speeds;
        port.ltssm = ltssm::L0;
    }

    for (&id, section) in ports {
        let Some(port) = switch.port_mut(id) else {
            warn!(ppid = id, "port section for a port that does not exist");
            continue;
        };
        if let Some(device) = &section.device {
            port.device_name = Some(device.clone());
        }
        if let Some(mlw) = section.mlw {
            port.mlw = mlw;
        }
        if let Some(mls) = section.mls {
            port.mls = mls;
        }
        if let Some(state) = section.state {
            port.state = PortState::from_raw(state);
        }
    }
}

fn apply_vcss(switch: &mut CxlSwitch, vcss: &BTreeMap<u8, VcsSection>) {
    for (&id, section) in vcss {
        let Some(vcs) = switch.vcs_mut(id) else {
            warn!(vcsid = id, "vcs section for a vcs that does not exist");
            continue;
        };
        if let Some(state) = section.state {
            vcs.state = VcsState::from_raw(state);
        }
        if let Some(uspid) = section.uspid {
            vcs.uspid = uspid;
        }
        if let Some(num) = section.num_vppb {
            vcs.num = num.min(cse_switch::MAX_VPPBS_PER_VCS as u16);
        }
        for (&vppbid, vppb_section) in &section.vppbs {
            let Some(vppb) = vcs.vppbs.get_mut(usize::from(vppbid)) else {
                continue;
            };
            if let Some(status) = vppb_section.bind_status {
                vppb.bind_status = BindStatus::from_raw(status);
            }
            if let Some(ppid) = vppb_section.ppid {
                vppb.ppid = ppid;
            }
            if let Some(ldid) = vppb_section.ldid {
                vppb.ldid = ldid;
            }
        }
    }
}

/// Connect every port whose `device` names a catalog entry.
fn connect_named_ports(switch: &mut CxlSwitch) {
    let pairs: Vec<(u8, u8)> = switch
        .ports
        .iter()
        .filter_map(|port| {
            let name = port.device_name.as_deref()?;
            match switch.device_by_name(name) {
                Some(devid) => Some((port.ppid, devid)),
                None => {
                    warn!(ppid = port.ppid, device = name, "no catalog entry for port device");
                    None
                }
            }
        })
        .collect();
    for (ppid, devid) in pairs {
        if let Err(err) = switch.connect_device(ppid, devid) {
            warn!(ppid, devid, %err, "initial connect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
emulator:
  tcp-port: 2600
  dir: /tmp/cse-test
devices:
  sld_8G:
    did: 0
    port: { dv: 2, dt: 4, cv: 1, mlw: 16, mls: 5 }
    pcicfg: { vendor: 0x1AF4, device: 0x1110, baseclass: 0x05 }
  mld_5x8_2.0_4G:
    did: 3
    port: { dv: 2, dt: 5, cv: 1, mlw: 8, mls: 5 }
    mld:
      memory_size: 0x100000000
      num: 4
      granularity: 0
      rng1: [0, 4, 8, 12]
      rng2: [3, 7, 11, 15]
      alloc_bw: [16, 16, 16, 16]
switch:
  vid: 0xB1B2
  num_ports: 32
  num_vcss: 4
  num_vppbs: 256
ports:
  1: { device: mld_5x8_2.0_4G }
  2: { mlw: 4, state: 0 }
vcss:
  0:
    state: 1
    uspid: 0
    num_vppb: 8
    vppbs:
      2: { bind_status: 2, ppid: 2, ldid: 0 }
"#;

    fn parsed() -> (CxlSwitch, ServerSettings) {
        let doc: Document = serde_yaml::from_str(DOC).unwrap();
        build(doc)
    }

    #[test]
    fn emulator_section_feeds_server_settings() {
        let (switch, settings) = parsed();
        assert_eq!(settings.tcp_port, 2600);
        assert_eq!(switch.dir.as_deref(), Some(Path::new("/tmp/cse-test")));
    }

    #[test]
    fn devices_land_in_the_catalog_by_did() {
        let (switch, _) = parsed();
        assert_eq!(switch.device(0).unwrap().name, "sld_8G");
        assert!(switch.device(1).is_none());
        let mld_dev = switch.device(3).unwrap();
        assert_eq!(mld_dev.dt, DevType::CxlType3Pooled);
        let mld = mld_dev.mld.as_ref().unwrap();
        assert_eq!(mld.num, 4);
        assert_eq!(mld.rng2[3], 15);
        assert_eq!(mld.alloc_bw[0], 16);
        // Config header fields land at their standard offsets.
        let cfg = switch.device(0).unwrap().cfgspace.as_bytes();
        assert_eq!(&cfg[0..2], &0x1AF4u16.to_le_bytes());
        assert_eq!(cfg[0x0B], 0x05);
    }

    #[test]
    fn named_port_is_connected_at_load() {
        let (switch, _) = parsed();
        let port = switch.port(1).unwrap();
        assert_eq!(port.prsnt, 1);
        assert_eq!(port.dt, DevType::CxlType3Pooled);
        assert_eq!(port.ld, 4);
        assert_eq!(port.device_name.as_deref(), Some("mld_5x8_2.0_4G"));
        // 8 lanes negotiated against the port's 16, nibble-encoded.
        assert_eq!(port.nlw, 8 << 4);
    }

    #[test]
    fn port_overrides_apply_over_loader_defaults() {
        let (switch, _) = parsed();
        // Unmentioned ports get the active-DSP loader default.
        assert_eq!(switch.port(5).unwrap().state, PortState::Dsp);
        assert_eq!(switch.port(5).unwrap().ltssm, ltssm::L0);
        // Port 2 was explicitly disabled and narrowed.
        assert_eq!(switch.port(2).unwrap().state, PortState::Disabled);
        assert_eq!(switch.port(2).unwrap().mlw, 4);
    }

    #[test]
    fn vcs_section_builds_prebindings() {
        let (switch, _) = parsed();
        let vcs = switch.vcs(0).unwrap();
        assert_eq!(vcs.state, VcsState::Enabled);
        assert_eq!(vcs.num, 8);
        assert_eq!(vcs.vppbs[2].bind_status, BindStatus::BoundPort);
        assert_eq!(vcs.vppbs[2].ppid, 2);
    }

    #[test]
    fn empty_document_builds_defaults() {
        let (switch, settings) = build(Document::default());
        assert_eq!(switch.num_ports(), 32);
        assert_eq!(switch.num_vcss(), 32);
        assert_eq!(settings.tcp_port, 2508);
    }

    #[test]
    fn capability_lists_are_chained_into_config_space() {
        let doc = r#"
devices:
  dev:
    did: 0
    pcicfg:
      vendor: 0x1AF4
      cap:
        0x01: [0x03, 0x00]          # PM: two body bytes
        0x05: [0x00, 0x00, 0x00]    # MSI: three body bytes
      ecap:
        0x0001: { ver: 2, data: [0xAA, 0xBB, 0xCC, 0xDD] }
        0x0019: { ver: 1 }
switch: { num_ports: 4 }
"#;
        let parsed: Document = serde_yaml::from_str(doc).unwrap();
        let (switch, _) = build(parsed);
        let cfg = switch.device(0).unwrap().cfgspace.as_bytes();

        // First cap at 0x40, anchored at the capabilities pointer.
        assert_eq!(cfg[0x34], 0x40);
        assert_eq!(cfg[0x40], 0x01);
        // Its next pointer lands right after the two body bytes.
        assert_eq!(cfg[0x41], 0x44);
        assert_eq!(cfg[0x44], 0x05);
        assert_eq!(cfg[0x45], 0x00);

        // First ecap header: id 0x0001, ver 2, next 0x108.
        let hdr = u32::from_le_bytes([cfg[0x100], cfg[0x101], cfg[0x102], cfg[0x103]]);
        assert_eq!(hdr & 0xFFFF, 0x0001);
        assert_eq!((hdr >> 16) & 0xF, 2);
        assert_eq!(hdr >> 20, 0x108);
        assert_eq!(&cfg[0x104..0x108], &[0xAA, 0xBB, 0xCC, 0xDD]);
        // Second ecap terminates the chain.
        let hdr = u32::from_le_bytes([cfg[0x108], cfg[0x109], cfg[0x10A], cfg[0x10B]]);
        assert_eq!(hdr & 0xFFFF, 0x0019);
        assert_eq!(hdr >> 20, 0);
    }
}
