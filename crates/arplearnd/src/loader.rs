//! Classifier object loading
//!
//! The compiled ARP classifier is an external artifact. It is read from
//! disk, its ingress program is loaded into the kernel, and the events ring
//! buffer map is handed to the event source.

use crate::error::{ArpLearnError, Result};
use aya::Ebpf;
use aya::maps::{MapData, RingBuf};
use aya::programs::SchedClassifier;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Lift RLIMIT_MEMLOCK for kernels that still charge BPF maps against it
pub fn raise_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    // SAFETY: setrlimit only reads the provided struct
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        warn!(
            error = %std::io::Error::last_os_error(),
            "Failed to remove memlock limit"
        );
    } else {
        debug!("Removed memlock limit");
    }
}

/// Read and load the classifier object from `path`
#[instrument]
pub fn load_object(path: &Path) -> Result<Ebpf> {
    raise_memlock_rlimit();
    let ebpf = Ebpf::load_file(path)
        .map_err(|e| ArpLearnError::Load(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), "Loaded classifier object");
    Ok(ebpf)
}

/// Look up `name` as a classifier program and load it into the kernel
pub fn load_classifier<'a>(ebpf: &'a mut Ebpf, name: &str) -> Result<&'a mut SchedClassifier> {
    let program: &mut SchedClassifier = ebpf
        .program_mut(name)
        .ok_or_else(|| ArpLearnError::Program(format!("program '{}' not found in object", name)))?
        .try_into()
        .map_err(|e| ArpLearnError::Program(format!("'{}' is not a classifier: {}", name, e)))?;
    program
        .load()
        .map_err(|e| ArpLearnError::Program(format!("failed to load '{}': {}", name, e)))?;
    debug!(program = name, "Loaded classifier program");
    Ok(program)
}

/// Take ownership of the events ring buffer map
pub fn take_events_map(ebpf: &mut Ebpf, name: &str) -> Result<RingBuf<MapData>> {
    let map = ebpf
        .take_map(name)
        .ok_or_else(|| ArpLearnError::Map(format!("map '{}' not found in object", name)))?;
    RingBuf::try_from(map)
        .map_err(|e| ArpLearnError::Map(format!("'{}' is not a ring buffer: {}", name, e)))
}
