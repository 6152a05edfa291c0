//! Multi-logical devices and their optional memory-mapped backing.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::{CfgSpace, MAX_LD};

/// MLD allocation quantum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Granularity {
    #[default]
    Mib256 = 0,
    Mib512 = 1,
    Gib1 = 2,
}

impl Granularity {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Granularity::Mib512,
            2 => Granularity::Gib1,
            _ => Granularity::Mib256,
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Granularity::Mib256 => 256 << 20,
            Granularity::Mib512 => 512 << 20,
            Granularity::Gib1 => 1 << 30,
        }
    }
}

/// A writable shared mapping of the MLD's memory image.
///
/// The backing file is created sparse and truncated to the device's memory
/// size, so untouched regions read as zero. The mapping is flushed before it
/// is dropped; [`Mld`] keeps it ahead of its other fields so teardown syncs
/// the file before the rest of the device state goes away.
pub struct MemSpace {
    path: PathBuf,
    map: MmapMut,
}

impl MemSpace {
    /// Create (or replace) `<dir>/port<ppid>` sized to `len` and map it.
    pub fn create(dir: &Path, ppid: u8, len: u64) -> io::Result<Self> {
        let path = dir.join(format!("port{ppid:02}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(len)?;
        // SAFETY: the file was just created and truncated by this process;
        // nothing else maps it.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    pub fn read(&self, offset: u64, out: &mut [u8]) {
        let at = offset as usize;
        out.copy_from_slice(&self.map[at..at + out.len()]);
    }

    pub fn write(&mut self, offset: u64, data: &[u8]) {
        let at = offset as usize;
        self.map[at..at + data.len()].copy_from_slice(data);
    }

    pub fn flush(&self) -> io::Result<()> {
        self.map.flush()
    }
}

impl Drop for MemSpace {
    fn drop(&mut self) {
        let _ = self.map.flush();
    }
}

impl std::fmt::Debug for MemSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemSpace")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

/// A multi-logical device attached to a port.
#[derive(Debug)]
pub struct Mld {
    // Dropped first so the backing file is synced while the rest of the
    // device is still intact.
    pub memspace: Option<MemSpace>,

    pub memory_size: u64,
    /// Logical device count, at most [`MAX_LD`].
    pub num: u16,
    /// Egress port congestion supported.
    pub epc: u8,
    /// Temporary throughput reduction supported.
    pub ttr: u8,
    pub granularity: Granularity,
    /// Range 1 allocation multipliers, one per LD.
    pub rng1: [u64; MAX_LD],
    /// Range 2 allocation multipliers, one per LD.
    pub rng2: [u64; MAX_LD],

    pub epc_en: u8,
    pub ttr_en: u8,
    /// Moderate-congestion threshold, percent.
    pub egress_mod_pcnt: u8,
    /// Severe-congestion threshold, percent.
    pub egress_sev_pcnt: u8,
    pub sample_interval: u8,
    pub rcb: u16,
    pub comp_interval: u8,
    pub bp_avg_pcnt: u8,

    pub alloc_bw: [u8; MAX_LD],
    pub bw_limit: [u8; MAX_LD],

    /// Per-LD PCIe configuration spaces, `num` entries.
    pub cfgspace: Vec<CfgSpace>,
    /// Whether connecting this device should map a backing file.
    pub want_mmap: bool,
}

impl Mld {
    pub fn new(num: u16) -> Self {
        let num = num.min(MAX_LD as u16);
        Self {
            memspace: None,
            memory_size: 0,
            num,
            epc: 0,
            ttr: 0,
            granularity: Granularity::Mib256,
            rng1: [0; MAX_LD],
            rng2: [0; MAX_LD],
            epc_en: 0,
            ttr_en: 0,
            egress_mod_pcnt: 10,
            egress_sev_pcnt: 25,
            sample_interval: 8,
            rcb: 0,
            comp_interval: 64,
            bp_avg_pcnt: 0,
            alloc_bw: [0; MAX_LD],
            bw_limit: [0; MAX_LD],
            cfgspace: Vec::new(),
            want_mmap: false,
        }
    }

    /// Byte range of one LD within the memory image:
    /// `granularity * rng1[ldid] .. granularity * (rng2[ldid] + 1)`.
    ///
    /// The multipliers are writable over the wire, so the arithmetic
    /// saturates instead of trusting them.
    pub fn ld_range(&self, ldid: u16) -> (u64, u64) {
        let g = self.granularity.bytes();
        let base = g.saturating_mul(self.rng1[usize::from(ldid)]);
        let max = g.saturating_mul(self.rng2[usize::from(ldid)].saturating_add(1));
        (base, max)
    }

    /// Copy the template state of this MLD, without any live mapping, and
    /// with per-LD config spaces cloned from `cfg_template`.
    pub fn instantiate(&self, cfg_template: &CfgSpace) -> Self {
        Self {
            memspace: None,
            memory_size: self.memory_size,
            num: self.num,
            epc: self.epc,
            ttr: self.ttr,
            granularity: self.granularity,
            rng1: self.rng1,
            rng2: self.rng2,
            epc_en: self.epc_en,
            ttr_en: self.ttr_en,
            egress_mod_pcnt: self.egress_mod_pcnt,
            egress_sev_pcnt: self.egress_sev_pcnt,
            sample_interval: self.sample_interval,
            rcb: self.rcb,
            comp_interval: self.comp_interval,
            bp_avg_pcnt: self.bp_avg_pcnt,
            alloc_bw: self.alloc_bw,
            bw_limit: self.bw_limit,
            cfgspace: (0..self.num).map(|_| cfg_template.clone()).collect(),
            want_mmap: self.want_mmap,
        }
    }
}
