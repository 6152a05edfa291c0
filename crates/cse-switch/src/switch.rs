//! The switch itself: construction, device connect/disconnect, and the
//! read-only projections the command handlers serve.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use cse_fmapi_protocol::isc::{IscBosRsp, IscIdRsp};
use cse_fmapi_protocol::psc::{PscIdRsp, PscPortInfo};
use cse_fmapi_protocol::vsc::{VppbStatus, VscInfoBlk};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    ltssm, BindStatus, DeviceEntry, MemSpace, Port, PortState, Vcs, VcsState, MAX_PORTS,
    MAX_VCSS, MAX_VPPBS,
};

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("no such port: {ppid}")]
    UnknownPort { ppid: u8 },
    #[error("no such device profile: {devid}")]
    UnknownDevice { devid: u8 },
    #[error("backing file for port {ppid}")]
    Backing {
        ppid: u8,
        #[source]
        source: io::Error,
    },
}

/// Status of the most recent background-capable command. Bind and unbind
/// report background semantics on the wire but complete before the response
/// is sent, so this block always reads 100% done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundOp {
    pub running: u8,
    pub pcnt: u8,
    pub opcode: u16,
    pub rc: u16,
    pub ext: u16,
}

impl BackgroundOp {
    /// Record `opcode` as started and synchronously finished.
    pub fn complete(&mut self, opcode: u16) {
        self.running = 0;
        self.pcnt = 100;
        self.opcode = opcode;
        self.rc = 0;
        self.ext = 0;
    }
}

/// The canonical switch state.
pub struct CxlSwitch {
    pub version: u8,
    pub vid: u16,
    pub did: u16,
    pub svid: u16,
    pub ssid: u16,
    pub sn: u64,
    /// Max message payload size exponent.
    pub max_msg_size_n: u8,
    /// Response message limit exponent, valid range 8..=20.
    pub msg_rsp_limit_n: u8,
    pub bos: BackgroundOp,
    pub ingress_port: u8,
    /// Configured vPPB capacity across all VCSs.
    pub num_vppbs: u16,
    /// HDM decoders available per USP.
    pub num_decoders: u8,

    // Port defaults applied by the configuration loader.
    pub default_mlw: u8,
    pub default_speeds: u8,
    pub default_mls: u8,

    /// Directory for MLD backing files; mapping is skipped when unset.
    pub dir: Option<PathBuf>,

    pub ports: Vec<Port>,
    pub vcss: Vec<Vcs>,
    /// Device catalog, indexed by device id; gaps stay empty.
    pub devices: Vec<Option<DeviceEntry>>,
}

impl CxlSwitch {
    /// Build a switch with `ports`/`vcss`/`vppbs` capacity (clamped to the
    /// model maxima) and every entity in its disabled default state.
    pub fn new(ports: usize, vcss: usize, vppbs: usize) -> Self {
        let ports = ports.min(MAX_PORTS);
        let vcss = vcss.min(MAX_VCSS);
        let vppbs = vppbs.min(MAX_VPPBS);
        Self {
            version: 1,
            vid: 0xB1B2,
            did: 0xC1C2,
            svid: 0xD1D2,
            ssid: 0xE1E2,
            sn: 0xA1A2_A3A4_A5A6_A7A8,
            max_msg_size_n: 13,
            msg_rsp_limit_n: 13,
            bos: BackgroundOp::default(),
            ingress_port: 1,
            num_vppbs: vppbs as u16,
            num_decoders: 42,
            default_mlw: 16,
            default_speeds: crate::link_speed::ALL_TO_PCIE5,
            default_mls: 5,
            dir: None,
            ports: (0..ports).map(|i| Port::new(i as u8)).collect(),
            vcss: (0..vcss).map(|i| Vcs::new(i as u8)).collect(),
            devices: Vec::new(),
        }
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    pub fn num_vcss(&self) -> usize {
        self.vcss.len()
    }

    pub fn port(&self, ppid: u8) -> Option<&Port> {
        self.ports.get(usize::from(ppid))
    }

    pub fn port_mut(&mut self, ppid: u8) -> Option<&mut Port> {
        self.ports.get_mut(usize::from(ppid))
    }

    pub fn vcs(&self, vcsid: u8) -> Option<&Vcs> {
        self.vcss.get(usize::from(vcsid))
    }

    pub fn vcs_mut(&mut self, vcsid: u8) -> Option<&mut Vcs> {
        self.vcss.get_mut(usize::from(vcsid))
    }

    pub fn device(&self, devid: u8) -> Option<&DeviceEntry> {
        self.devices.get(usize::from(devid))?.as_ref()
    }

    /// Install a catalog entry at `devid`, growing the table as needed.
    pub fn set_device(&mut self, devid: u8, entry: DeviceEntry) {
        let at = usize::from(devid);
        if self.devices.len() <= at {
            self.devices.resize_with(at + 1, || None);
        }
        self.devices[at] = Some(entry);
    }

    /// Find a catalog entry by profile name.
    pub fn device_by_name(&self, name: &str) -> Option<u8> {
        self.devices
            .iter()
            .position(|d| d.as_ref().is_some_and(|d| d.name == name))
            .map(|i| i as u8)
    }

    /// Populate a port from a catalog profile, as if the device were
    /// inserted into the slot.
    pub fn connect_device(&mut self, ppid: u8, devid: u8) -> Result<(), SwitchError> {
        let entry = self
            .devices
            .get(usize::from(devid))
            .and_then(Option::as_ref)
            .ok_or(SwitchError::UnknownDevice { devid })?;
        let dir = self.dir.clone();
        let port = self
            .ports
            .get_mut(usize::from(ppid))
            .ok_or(SwitchError::UnknownPort { ppid })?;

        port.dv = entry.dv;
        port.dt = entry.dt;
        port.cv = entry.cv;
        port.ltssm = ltssm::L0;
        port.lane = 0;
        port.lane_rev = 0;
        port.perst = 0;
        port.pwrctrl = 0;
        port.ld = 0;
        port.state = if entry.rootport {
            PortState::Usp
        } else {
            PortState::Dsp
        };
        // Link parameters negotiate to the lower of the two sides; the
        // negotiated width is nibble-encoded.
        port.nlw = entry.mlw.min(port.mlw) << 4;
        port.cls = entry.mls.min(port.mls);
        port.prsnt = 1;
        port.cfgspace
            .as_bytes_mut()
            .copy_from_slice(entry.cfgspace.as_bytes());

        if let Some(template) = &entry.mld {
            let mut mld = template.instantiate(&entry.cfgspace);
            port.ld = mld.num as u8;
            if mld.want_mmap {
                if let Some(dir) = &dir {
                    let memspace = MemSpace::create(dir, ppid, mld.memory_size)
                        .map_err(|source| SwitchError::Backing { ppid, source })?;
                    debug!(ppid, path = %memspace.path().display(), "mapped MLD backing file");
                    mld.memspace = Some(memspace);
                }
            }
            port.mld = Some(mld);
        }

        info!(ppid, device = %entry.name, "connected device");
        Ok(())
    }

    /// Clear a port back to the empty-slot state. The port's configuration
    /// state is deliberately left alone; only device-derived fields reset.
    pub fn disconnect_device(&mut self, ppid: u8) -> Result<(), SwitchError> {
        let port = self
            .ports
            .get_mut(usize::from(ppid))
            .ok_or(SwitchError::UnknownPort { ppid })?;

        port.dv = 0;
        port.dt = crate::DevType::None;
        port.cv = 0;
        port.nlw = 0;
        port.cls = 0;
        port.ltssm = 0;
        port.lane = 0;
        port.lane_rev = 0;
        port.perst = 0;
        port.prsnt = 0;
        port.pwrctrl = 0;
        port.ld = 0;
        port.cfgspace.zero();
        port.device_name = None;

        if let Some(mld) = &mut port.mld {
            // Sync the backing file before the device state goes away.
            if let Some(memspace) = mld.memspace.take() {
                let _ = memspace.flush();
            }
        }
        port.mld = None;

        info!(ppid, "disconnected device");
        Ok(())
    }

    /// Count of vPPBs bound anywhere on the switch.
    pub fn active_vppbs(&self) -> u16 {
        self.vcss
            .iter()
            .flat_map(|v| v.vppbs.iter().take(usize::from(v.num)))
            .filter(|b| b.bind_status != BindStatus::Unbound)
            .count() as u16
    }

    /// Identify-switch projection.
    pub fn identity(&self) -> PscIdRsp {
        let mut rsp = PscIdRsp {
            vid: self.vid,
            did: self.did,
            svid: self.svid,
            ssid: self.ssid,
            sn: self.sn,
            ingress_port: self.ingress_port,
            num_ports: self.ports.len() as u8,
            num_vcss: self.vcss.len() as u8,
            num_vppbs: self.num_vppbs,
            active_vppbs: self.active_vppbs(),
            num_decoders: self.num_decoders,
            ..Default::default()
        };
        for (i, port) in self.ports.iter().enumerate() {
            if port.state != PortState::Disabled && i / 8 < rsp.active_ports.len() {
                rsp.active_ports[i / 8] |= 1 << (i % 8);
            }
        }
        for (i, vcs) in self.vcss.iter().enumerate() {
            if vcs.state == VcsState::Enabled && i / 8 < rsp.active_vcss.len() {
                rsp.active_vcss[i / 8] |= 1 << (i % 8);
            }
        }
        rsp
    }

    /// Infrastructure-identify projection.
    pub fn isc_identity(&self) -> IscIdRsp {
        IscIdRsp {
            vid: self.vid,
            did: self.did,
            svid: self.svid,
            ssid: self.ssid,
            sn: self.sn,
            max_msg_size_n: self.max_msg_size_n,
        }
    }

    /// Background-operation projection.
    pub fn bos_status(&self) -> IscBosRsp {
        IscBosRsp {
            running: self.bos.running,
            pcnt: self.bos.pcnt,
            opcode: self.bos.opcode,
            rc: self.bos.rc,
            ext: self.bos.ext,
        }
    }

    /// Per-port projection.
    pub fn port_info(port: &Port) -> PscPortInfo {
        PscPortInfo {
            ppid: port.ppid,
            state: port.state as u8,
            dv: port.dv,
            dt: port.dt as u8,
            cv: port.cv,
            mlw: port.mlw,
            nlw: port.nlw,
            speeds: port.speeds,
            mls: port.mls,
            cls: port.cls,
            ltssm: port.ltssm,
            lane: port.lane,
            lane_rev: port.lane_rev,
            perst: port.perst,
            prsnt: port.prsnt,
            pwrctrl: port.pwrctrl,
            num_ld: port.ld,
        }
    }

    /// Per-VCS projection over the vPPB window `[start, start+limit)`.
    pub fn vcs_info(vcs: &Vcs, vppbid_start: u8, vppbid_limit: u8) -> VscInfoBlk {
        let start = usize::from(vppbid_start);
        let stop = usize::from(vcs.num).min(start.saturating_add(usize::from(vppbid_limit)));
        let vppbs = (start..stop)
            .map(|i| {
                let b = &vcs.vppbs[i];
                VppbStatus {
                    status: b.bind_status as u8,
                    ppid: b.ppid,
                    ldid: b.ldid,
                }
            })
            .collect();
        VscInfoBlk {
            vcsid: vcs.vcsid,
            state: vcs.state as u8,
            uspid: vcs.uspid,
            total: vcs.num as u8,
            vppbs,
        }
    }

    /// Render the full switch state, one entity per line, for
    /// `--print-state`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "switch:");
        let _ = writeln!(out, "  vid:          {:#06x}", self.vid);
        let _ = writeln!(out, "  did:          {:#06x}", self.did);
        let _ = writeln!(out, "  sn:           {:#018x}", self.sn);
        let _ = writeln!(out, "  ingress_port: {}", self.ingress_port);
        let _ = writeln!(out, "  num_ports:    {}", self.ports.len());
        let _ = writeln!(out, "  num_vcss:     {}", self.vcss.len());
        let _ = writeln!(out, "  num_vppbs:    {}", self.num_vppbs);
        let _ = writeln!(out, "  num_decoders: {}", self.num_decoders);
        if let Some(dir) = &self.dir {
            let _ = writeln!(out, "  dir:          {}", dir.display());
        }
        let _ = writeln!(out, "ports:");
        for port in &self.ports {
            let _ = writeln!(
                out,
                "  {:02}: state={:?} dt={:?} prsnt={} nlw={:#x} cls={} ld={} device={}",
                port.ppid,
                port.state,
                port.dt,
                port.prsnt,
                port.nlw,
                port.cls,
                port.ld,
                port.device_name.as_deref().unwrap_or("-"),
            );
            if let Some(mld) = &port.mld {
                let _ = writeln!(
                    out,
                    "      mld: size={:#x} num={} granularity={:?} mapped={}",
                    mld.memory_size,
                    mld.num,
                    mld.granularity,
                    mld.memspace.is_some(),
                );
                for i in 0..usize::from(mld.num) {
                    let _ = writeln!(
                        out,
                        "      ld {:2}: rng1={:#x} rng2={:#x} alloc_bw={} bw_limit={}",
                        i, mld.rng1[i], mld.rng2[i], mld.alloc_bw[i], mld.bw_limit[i],
                    );
                }
            }
        }
        let _ = writeln!(out, "vcss:");
        for vcs in &self.vcss {
            let _ = writeln!(
                out,
                "  {:02}: state={:?} uspid={} num_vppb={}",
                vcs.vcsid, vcs.state, vcs.uspid, vcs.num,
            );
            for (i, vppb) in vcs.vppbs.iter().take(usize::from(vcs.num)).enumerate() {
                let _ = writeln!(
                    out,
                    "      vppb {:3}: {:?} ppid={} ldid={:#06x}",
                    i, vppb.bind_status, vppb.ppid, vppb.ldid,
                );
            }
        }
        out
    }
}
