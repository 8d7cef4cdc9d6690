//! Best-effort worker-to-core pinning.
//!
//! Workers are a fixed pool for the duration of a run; pinning keeps them
//! from migrating mid-run. Failure to pin is not an error — the return value
//! exists for diagnostics only.

#[cfg(target_os = "linux")]
pub(crate) fn pin_to_core(core: usize) -> bool {
    // SAFETY: operates on a zeroed cpu_set_t entirely within its capacity.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core % (libc::CPU_SETSIZE as usize), &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(windows)]
pub(crate) fn pin_to_core(core: usize) -> bool {
    use windows_sys::Win32::System::Threading::{GetCurrentThread, SetThreadAffinityMask};
    // Only the first 64 cores are addressable through this API.
    let mask = 1usize << (core % (usize::BITS as usize));
    // SAFETY: pseudo-handle to the current thread; mask is a plain value.
    unsafe { SetThreadAffinityMask(GetCurrentThread(), mask) != 0 }
}

#[cfg(not(any(target_os = "linux", windows)))]
pub(crate) fn pin_to_core(_core: usize) -> bool {
    false
}
