//! MLD component commands, reached only through the MPC_TMC tunnel.
//!
//! Each handler operates on the MLD of the port the tunnel named. The lock
//! is held by the outer dispatch; these functions return the inner return
//! code and the encoded inner response payload.

use cse_fmapi_protocol::mcc::{
    LdAllocEntry, MccAllocGetReq, MccAllocGetRsp, MccAllocSet, MccBwGetReq, MccBwList,
    MccInfoRsp, MccQosCtrl, MccQosStatRsp, MccRequest, MccResponse,
};
use cse_fmapi_protocol::FmRc;
use cse_switch::{Mld, Port};
use tracing::{debug, warn};

/// Dispatch one tunneled component command against `port`.
pub fn handle(port: &mut Port, req: &MccRequest) -> (FmRc, Vec<u8>) {
    let ppid = port.ppid;
    let Some(mld) = port.mld.as_mut() else {
        warn!(ppid, "component command for a port without an mld");
        return (FmRc::InvalidInput, Vec::new());
    };
    let (rc, rsp) = match req {
        MccRequest::Info => info(mld),
        MccRequest::AllocGet(req) => alloc_get(mld, req),
        MccRequest::AllocSet(req) => alloc_set(mld, req),
        MccRequest::QosCtrlGet => qos_ctrl_get(mld),
        MccRequest::QosCtrlSet(req) => qos_ctrl_set(mld, req),
        MccRequest::QosStat => qos_stat(mld),
        MccRequest::QosBwAllocGet(req) => bw_get(&mld.alloc_bw, mld.num, req, false),
        MccRequest::QosBwAllocSet(req) => bw_set(&mut mld.alloc_bw, mld.num, req, false),
        MccRequest::QosBwLimitGet(req) => bw_get(&mld.bw_limit, mld.num, req, true),
        MccRequest::QosBwLimitSet(req) => bw_set(&mut mld.bw_limit, mld.num, req, true),
    };
    let mut payload = Vec::new();
    if let Some(rsp) = rsp {
        rsp.encode(&mut payload);
    }
    (rc, payload)
}

fn info(mld: &Mld) -> (FmRc, Option<MccResponse>) {
    debug!("cmd: mcc get ld info");
    (
        FmRc::Success,
        Some(MccResponse::Info(MccInfoRsp {
            memory_size: mld.memory_size,
            num: mld.num,
            epc: mld.epc,
            ttr: mld.ttr,
        })),
    )
}

fn alloc_get(mld: &Mld, req: &MccAllocGetReq) -> (FmRc, Option<MccResponse>) {
    debug!(start = req.start, limit = req.limit, "cmd: mcc get ld allocations");
    if u16::from(req.start) > mld.num {
        warn!(start = req.start, num = mld.num, "start exceeds ld count");
        return (FmRc::InvalidInput, None);
    }
    let start = usize::from(req.start);
    let stop = usize::from(mld.num).min(start + usize::from(req.limit));
    let entries = (start..stop)
        .map(|i| LdAllocEntry {
            rng1: mld.rng1[i],
            rng2: mld.rng2[i],
        })
        .collect();
    (
        FmRc::Success,
        Some(MccResponse::AllocGet(MccAllocGetRsp {
            total: mld.num as u8,
            granularity: mld.granularity as u8,
            start: req.start,
            entries,
        })),
    )
}

fn alloc_set(mld: &mut Mld, req: &MccAllocSet) -> (FmRc, Option<MccResponse>) {
    debug!(start = req.start, num = req.entries.len(), "cmd: mcc set ld allocations");
    let start = usize::from(req.start);
    let num = req.entries.len();
    if num > usize::from(mld.num)
        || start > usize::from(mld.num)
        || start + num > usize::from(mld.num)
    {
        warn!(start, num, total = mld.num, "allocation window out of range");
        return (FmRc::InvalidInput, None);
    }
    for (i, entry) in req.entries.iter().enumerate() {
        mld.rng1[start + i] = entry.rng1;
        mld.rng2[start + i] = entry.rng2;
    }
    // Echo what is now stored.
    let entries = (start..start + num)
        .map(|i| LdAllocEntry {
            rng1: mld.rng1[i],
            rng2: mld.rng2[i],
        })
        .collect();
    (
        FmRc::Success,
        Some(MccResponse::AllocSet(MccAllocSet {
            start: req.start,
            entries,
        })),
    )
}

fn qos_ctrl_block(mld: &Mld) -> MccQosCtrl {
    MccQosCtrl {
        epc_en: mld.epc_en,
        ttr_en: mld.ttr_en,
        egress_mod_pcnt: mld.egress_mod_pcnt,
        egress_sev_pcnt: mld.egress_sev_pcnt,
        sample_interval: mld.sample_interval,
        rcb: mld.rcb,
        comp_interval: mld.comp_interval,
    }
}

fn qos_ctrl_get(mld: &Mld) -> (FmRc, Option<MccResponse>) {
    debug!("cmd: mcc get qos control");
    (FmRc::Success, Some(MccResponse::QosCtrl(qos_ctrl_block(mld))))
}

/// Store the QoS control block. The scalars are taken as-is; the wire
/// domain is wider than the documented ranges and this command has never
/// narrowed it.
fn qos_ctrl_set(mld: &mut Mld, req: &MccQosCtrl) -> (FmRc, Option<MccResponse>) {
    debug!("cmd: mcc set qos control");
    mld.epc_en = req.epc_en;
    mld.ttr_en = req.ttr_en;
    mld.egress_mod_pcnt = req.egress_mod_pcnt;
    mld.egress_sev_pcnt = req.egress_sev_pcnt;
    mld.sample_interval = req.sample_interval;
    mld.rcb = req.rcb;
    mld.comp_interval = req.comp_interval;
    (FmRc::Success, Some(MccResponse::QosCtrl(qos_ctrl_block(mld))))
}

fn qos_stat(mld: &Mld) -> (FmRc, Option<MccResponse>) {
    debug!("cmd: mcc get qos status");
    (
        FmRc::Success,
        Some(MccResponse::QosStat(MccQosStatRsp {
            bp_avg_pcnt: mld.bp_avg_pcnt,
        })),
    )
}

fn bw_get(
    values: &[u8],
    total: u16,
    req: &MccBwGetReq,
    is_limit: bool,
) -> (FmRc, Option<MccResponse>) {
    debug!(start = req.start, num = req.num, is_limit, "cmd: mcc get qos bandwidth");
    if u16::from(req.start) > total {
        warn!(start = req.start, total, "start exceeds ld count");
        return (FmRc::InvalidInput, None);
    }
    let start = usize::from(req.start);
    let num = usize::from(req.num).min(usize::from(total) - start);
    let list = values[start..start + num].to_vec();
    let rsp = MccBwList {
        start: req.start,
        list,
    };
    let rsp = if is_limit {
        MccResponse::QosBwLimit(rsp)
    } else {
        MccResponse::QosBwAlloc(rsp)
    };
    (FmRc::Success, Some(rsp))
}

fn bw_set(
    values: &mut [u8],
    total: u16,
    req: &MccBwList,
    is_limit: bool,
) -> (FmRc, Option<MccResponse>) {
    debug!(start = req.start, num = req.list.len(), is_limit, "cmd: mcc set qos bandwidth");
    let start = usize::from(req.start);
    let num = req.list.len();
    if num > usize::from(total) || start + num > usize::from(total) {
        warn!(start, num, total, "bandwidth window out of range");
        return (FmRc::InvalidInput, None);
    }
    values[start..start + num].copy_from_slice(&req.list);
    let rsp = MccBwList {
        start: req.start,
        list: values[start..start + num].to_vec(),
    };
    let rsp = if is_limit {
        MccResponse::QosBwLimit(rsp)
    } else {
        MccResponse::QosBwAlloc(rsp)
    };
    (FmRc::Success, Some(rsp))
}
