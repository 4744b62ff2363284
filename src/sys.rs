//! Host queries.

/// Currently available physical memory in bytes, if the platform reports it.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn available_memory() -> Option<u64> {
    // SAFETY: sysconf has no preconditions and only reads system state.
    let pages = unsafe { libc::sysconf(libc::_SC_AVPHYS_PAGES) };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if pages <= 0 || page_size <= 0 {
        return None;
    }
    (pages as u64).checked_mul(page_size as u64)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn available_memory() -> Option<u64> {
    None
}

/// Largest file the packer will load: a third of available memory.
pub fn pack_size_limit(available: Option<u64>) -> Option<u64> {
    available.map(|bytes| bytes / 3)
}
