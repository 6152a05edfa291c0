//! Emulator control command handlers: list the device catalog and hot-plug
//! profiles into ports.

use cse_emapi_protocol::{
    DeviceListEntry, EmApiHdr, EmRc, ListDevRsp, EMOP_CONN_DEV, EMOP_DISCON_DEV, EMOP_LIST_DEV,
};
use cse_switch::CxlSwitch;
use tracing::{debug, info, warn};

/// The emulator-side handler outcome: return code, payload, and the
/// response header's `a` parameter (`b` is always zero in responses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmOutcome {
    pub rc: EmRc,
    pub payload: Vec<u8>,
    pub a: u8,
}

impl EmOutcome {
    fn invalid() -> Self {
        Self {
            rc: EmRc::InvalidInput,
            payload: Vec::new(),
            a: 0,
        }
    }
}

/// Route an emulator command. The model lock is held by the caller.
pub fn handle(switch: &mut CxlSwitch, hdr: &EmApiHdr) -> EmOutcome {
    match hdr.opcode {
        EMOP_LIST_DEV => list_dev(switch, hdr.a, hdr.b),
        EMOP_CONN_DEV => conn_dev(switch, hdr.a, hdr.b),
        EMOP_DISCON_DEV => disconn_dev(switch, hdr.a, hdr.b),
        opcode => {
            warn!(opcode = format_args!("{opcode:#06x}"), "unsupported emulator opcode");
            EmOutcome {
                rc: EmRc::Unsupported,
                payload: Vec::new(),
                a: 0,
            }
        }
    }
}

/// List catalog entries. `a` = number requested (0 means all), `b` = first
/// device id.
fn list_dev(switch: &CxlSwitch, num_requested: u8, start: u8) -> EmOutcome {
    debug!(num_requested, start, "cmd: em list devices");
    let total = switch.devices.len();
    let start = usize::from(start);
    if start >= total {
        warn!(start, total, "device list start out of range");
        return EmOutcome::invalid();
    }
    let num = match usize::from(num_requested) {
        0 => total - start,
        n => n.min(total - start),
    };

    // Every index in the window gets an entry; unpopulated slots report an
    // empty name so device ids stay stable across gaps.
    let devices: Vec<DeviceListEntry> = (start..start + num)
        .map(|devid| DeviceListEntry {
            devid: devid as u8,
            name: switch
                .device(devid as u8)
                .map(|d| d.name.clone())
                .unwrap_or_default(),
        })
        .collect();
    let mut payload = Vec::new();
    ListDevRsp { devices }.encode(&mut payload);
    EmOutcome {
        rc: EmRc::Success,
        payload,
        a: num as u8,
    }
}

/// Connect catalog device `b` to port `a`.
fn conn_dev(switch: &mut CxlSwitch, ppid: u8, devid: u8) -> EmOutcome {
    debug!(ppid, devid, "cmd: em connect device");
    if usize::from(ppid) >= switch.num_ports() {
        warn!(ppid, "port id out of range");
        return EmOutcome::invalid();
    }
    if switch.device(devid).is_none() {
        warn!(devid, "device id out of range or empty");
        return EmOutcome::invalid();
    }
    if let Err(err) = switch.connect_device(ppid, devid) {
        warn!(ppid, devid, %err, "connect failed");
        return EmOutcome::invalid();
    }
    EmOutcome {
        rc: EmRc::Success,
        payload: Vec::new(),
        a: 0,
    }
}

/// Disconnect port `a`; when `b` is non-zero, disconnect every populated
/// port.
fn disconn_dev(switch: &mut CxlSwitch, ppid: u8, all: u8) -> EmOutcome {
    debug!(ppid, all, "cmd: em disconnect device");
    let range = if all != 0 {
        0..switch.num_ports()
    } else {
        if usize::from(ppid) >= switch.num_ports() {
            warn!(ppid, "port id out of range");
            return EmOutcome::invalid();
        }
        usize::from(ppid)..usize::from(ppid) + 1
    };

    for id in range {
        let populated = switch.port(id as u8).is_some_and(|p| p.prsnt == 1);
        if populated {
            info!(ppid = id, "disconnecting");
            let _ = switch.disconnect_device(id as u8);
        }
    }
    EmOutcome {
        rc: EmRc::Success,
        payload: Vec::new(),
        a: 0,
    }
}
