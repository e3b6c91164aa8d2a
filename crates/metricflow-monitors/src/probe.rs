//! procfs-backed memory probe
//!
//! Default Linux implementation of `IMemoryProbe`. Readings come from
//! three kernel files:
//!
//! - `/proc/self/smaps_rollup` - PSS of this process, broken down by
//!   anonymous, file-backed, and shmem mappings
//! - `/proc/self/statm` - VM size and resident set, in pages
//! - `/proc/meminfo` - system totals and `MemAvailable`
//!
//! The proc root is injectable so tests point the probe at a fixture
//! directory instead of the live kernel.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use metricflow_core::ports::{HeapUsage, IMemoryProbe, ProbeError, ProcessPss, SystemMemory};

/// Assumed page size for `statm` readings. Linux on the platforms we care
/// about uses 4 KiB pages.
const PAGE_SIZE: u64 = 4_096;

/// Reads memory state from a procfs tree.
pub struct ProcfsMemoryProbe {
    proc_root: PathBuf,
}

impl ProcfsMemoryProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Probe an alternate procfs tree. Test seam.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }

    fn read(&self, rel: &str) -> Result<String, ProbeError> {
        Ok(fs::read_to_string(self.proc_root.join(rel))?)
    }
}

impl Default for ProcfsMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl IMemoryProbe for ProcfsMemoryProbe {
    fn process_pss(&self) -> Result<ProcessPss, ProbeError> {
        parse_smaps_rollup(&self.read("self/smaps_rollup")?)
    }

    fn heap_usage(&self) -> Result<HeapUsage, ProbeError> {
        parse_statm(&self.read("self/statm")?)
    }

    fn system_memory(&self) -> Result<SystemMemory, ProbeError> {
        parse_meminfo(&self.read("meminfo")?)
    }

    /// Writes a plain-text memory snapshot: the raw smaps_rollup and
    /// meminfo contents under a timestamped header. Not a binary heap
    /// dump, but enough to reconstruct what the process and system looked
    /// like at pressure time.
    fn dump_heap(&self, path: &Path) -> Result<(), ProbeError> {
        let rollup = self.read("self/smaps_rollup")?;
        let meminfo = self.read("meminfo")?;
        let body = format!(
            "metricflow heap snapshot {}\n\n== smaps_rollup ==\n{rollup}\n== meminfo ==\n{meminfo}",
            Utc::now().to_rfc3339()
        );
        fs::write(path, body)?;
        Ok(())
    }
}

/// Parse the `Pss*` lines of a smaps_rollup file. `Pss:` is required; the
/// per-kind breakdown lines are absent on older kernels and default to 0.
fn parse_smaps_rollup(text: &str) -> Result<ProcessPss, ProbeError> {
    let mut total_kb = None;
    let mut anon_kb = 0;
    let mut file_kb = 0;
    let mut shmem_kb = 0;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Pss:") {
            total_kb = Some(parse_kb("smaps_rollup", rest)?);
        } else if let Some(rest) = line.strip_prefix("Pss_Anon:") {
            anon_kb = parse_kb("smaps_rollup", rest)?;
        } else if let Some(rest) = line.strip_prefix("Pss_File:") {
            file_kb = parse_kb("smaps_rollup", rest)?;
        } else if let Some(rest) = line.strip_prefix("Pss_Shmem:") {
            shmem_kb = parse_kb("smaps_rollup", rest)?;
        }
    }

    let total_kb = total_kb.ok_or_else(|| ProbeError::Parse {
        source_name: "smaps_rollup",
        detail: "missing Pss line".into(),
    })?;

    Ok(ProcessPss {
        total_kb,
        anon_kb,
        file_kb,
        shmem_kb,
    })
}

/// Parse statm's first two fields (VM size and resident set, in pages).
/// Reported as an allocator-less approximation of heap usage: resident
/// bytes are "used", the rest of the VM size is "free".
fn parse_statm(text: &str) -> Result<HeapUsage, ProbeError> {
    let mut fields = text.split_whitespace();
    let size_pages: u64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ProbeError::Parse {
            source_name: "statm",
            detail: "missing or malformed size field".into(),
        })?;
    let resident_pages: u64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ProbeError::Parse {
            source_name: "statm",
            detail: "missing or malformed resident field".into(),
        })?;

    let total_bytes = size_pages * PAGE_SIZE;
    let used_bytes = resident_pages * PAGE_SIZE;
    Ok(HeapUsage {
        used_bytes,
        free_bytes: total_bytes.saturating_sub(used_bytes),
        total_bytes,
    })
}

/// Parse `MemTotal` and `MemAvailable` out of meminfo. The system is
/// considered low on memory when less than a tenth of it is available.
fn parse_meminfo(text: &str) -> Result<SystemMemory, ProbeError> {
    let mut total_kb = None;
    let mut avail_kb = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = Some(parse_kb("meminfo", rest)?);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            avail_kb = Some(parse_kb("meminfo", rest)?);
        }
    }

    let total_kb = total_kb.ok_or_else(|| ProbeError::Parse {
        source_name: "meminfo",
        detail: "missing MemTotal line".into(),
    })?;
    let avail_kb = avail_kb.ok_or_else(|| ProbeError::Parse {
        source_name: "meminfo",
        detail: "missing MemAvailable line".into(),
    })?;

    Ok(SystemMemory {
        avail_bytes: avail_kb * 1_024,
        total_bytes: total_kb * 1_024,
        low_memory: avail_kb * 10 < total_kb,
    })
}

fn parse_kb(source_name: &'static str, rest: &str) -> Result<u64, ProbeError> {
    rest.trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse {
            source_name,
            detail: format!("bad kB value: {}", rest.trim()),
        })
}
