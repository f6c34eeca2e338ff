//! Hardware cycle counter (TSC on x86_64, CNTVCT on aarch64).
//!
//! `read()` returns raw counter ticks. `ticks_to_ns()` converts a tick delta
//! to nanoseconds using a ratio calibrated once per process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use std::time::Instant;

/// `ns = ticks * NUMER / DENOM`, published by `calibrate()`.
static NUMER: AtomicU64 = AtomicU64::new(1);
static DENOM: AtomicU64 = AtomicU64::new(1);
static CALIBRATED: Once = Once::new();

/// Read the cycle counter. Single instruction on x86_64 and aarch64.
#[inline(always)]
pub(crate) fn read() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::x86_64::_rdtsc()
    }
    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) val) };
        val
    }
    // Elsewhere the "ticks" are already nanoseconds since a private epoch.
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        use std::sync::OnceLock;
        static FALLBACK_EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = FALLBACK_EPOCH.get_or_init(Instant::now);
        Instant::now().duration_since(*epoch).as_nanos() as u64
    }
}

/// Convert a tick delta to nanoseconds.
#[inline(always)]
pub(crate) fn ticks_to_ns(start: u64, end: u64) -> u64 {
    let ticks = end.wrapping_sub(start);
    let n = NUMER.load(Ordering::Relaxed);
    let d = DENOM.load(Ordering::Relaxed);
    (ticks as u128 * n as u128 / d as u128) as u64
}

/// Calibrate the tick-to-nanosecond ratio. Only the first call spins.
pub(crate) fn calibrate() {
    CALIBRATED.call_once(|| {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        {
            let wall_start = Instant::now();
            let tsc_start = read();

            let target = std::time::Duration::from_millis(2);
            while wall_start.elapsed() < target {}

            let tsc_end = read();
            let wall_ns = wall_start.elapsed().as_nanos() as u64;
            let tsc_ticks = tsc_end.wrapping_sub(tsc_start).max(1);

            let g = gcd(wall_ns, tsc_ticks).max(1);
            NUMER.store(wall_ns / g, Ordering::Release);
            DENOM.store(tsc_ticks / g, Ordering::Release);
            log::trace!("tsc calibrated: {} ticks per {} ns", tsc_ticks / g, wall_ns / g);
        }
    });
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
