//! Real-time helpers for `run --rt`.
//!
//! Memory locking applies to the whole process; SCHED_FIFO and CPU pinning
//! apply only to the fast echo-timing thread, through the hook it runs
//! before its first tick.

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
/// Capacity of cpu_set_t in CPU indices (bits).
const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(target_os = "linux")]
fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
}

#[cfg(target_os = "linux")]
fn memlock_limit_hint() -> Option<String> {
    unsafe {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        if libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) != 0 {
            return None;
        }
        let cur = rlim.assume_init().rlim_cur;
        if cur == libc::RLIM_INFINITY {
            Some("memlock limit: unlimited".to_string())
        } else {
            Some(format!("memlock limit: {} KiB", cur / 1024))
        }
    }
}

#[cfg(target_os = "linux")]
fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    let rc = unsafe { libc::mlockall(flags) };
    if rc != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn try_apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE};

    let attempted_all = matches!(lock, RtLock::All);
    let err = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => mlockall(MCL_CURRENT),
        RtLock::All => mlockall(MCL_CURRENT | MCL_FUTURE),
    };
    let Err(err) = err else {
        return Ok(());
    };

    // Fallback: if All failed due to permission or memory, try Current
    let mut fallback_err: Option<std::io::Error> = None;
    if attempted_all && is_retryable_memlock_error(&err) {
        match mlockall(MCL_CURRENT) {
            Ok(()) => return Ok(()),
            Err(e2) => fallback_err = Some(e2),
        }
    }

    let mut msg = format!(
        "mlockall({}) failed: {err}",
        if attempted_all {
            "current|future"
        } else {
            "current"
        }
    );
    if is_retryable_memlock_error(&err) {
        if let Some(h) = memlock_limit_hint() {
            msg.push_str(&format!("; {h}"));
        }
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        if let Some(e2) = fallback_err {
            msg.push_str(&format!("; fallback mlockall(current) also failed: {e2}"));
        }
    }
    Err(eyre::eyre!(msg))
}

/// Lock process memory once per process when `rt` is set.
#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, lock: RtLock) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| match try_apply_mem_lock(lock) {
        Ok(()) => tracing::info!(mode = ?lock, "RT: memory lock applied"),
        Err(err) => tracing::warn!(error = %err, "mlockall failed"),
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _lock: RtLock) {
    if rt {
        tracing::warn!("real-time mode is only supported on Linux; continuing without it");
    }
}

#[cfg(target_os = "linux")]
fn has_cap_sys_nice() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return true;
    };
    let has_cap = status.lines().any(|line| {
        if line.starts_with("CapEff:")
            && let Some(hex) = line.split_whitespace().nth(1)
            && let Ok(caps) = u64::from_str_radix(hex, 16)
        {
            return caps & 0x80_0000 != 0;
        }
        false
    });
    has_cap || unsafe { libc::geteuid() == 0 }
}

// Apply SCHED_FIFO to the calling thread, clamped to the system range.
#[cfg(target_os = "linux")]
fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    if !has_cap_sys_nice() {
        eyre::bail!(
            "insufficient privileges for SCHED_FIFO: needs CAP_SYS_NICE or root. \
             Hint: 'sudo setcap cap_sys_nice=ep /path/to/udm_cli'"
        );
    }
    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let prio_val = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: prio_val,
    };
    // pid 0 targets the calling thread
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        Err(eyre::eyre!(std::io::Error::last_os_error()))
    } else {
        Ok(prio_val)
    }
}

// Pin the calling thread to one CPU if the current affinity mask allows it.
#[cfg(target_os = "linux")]
fn try_apply_affinity(cpu: usize) -> eyre::Result<()> {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO};

    if cpu >= MAX_CPUSET_BITS {
        eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
    }
    let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        CPU_ZERO(&mut allowed);
        libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed)
    };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    if !unsafe { CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by current affinity mask");
    }
    let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        CPU_ZERO(&mut desired);
        CPU_SET(cpu, &mut desired);
    }
    let rc =
        unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired) };
    if rc != 0 {
        Err(eyre::eyre!(std::io::Error::last_os_error()))
    } else {
        Ok(())
    }
}

/// Hook for the fast thread: raise it to SCHED_FIFO and optionally pin it.
/// Failures are logged and the thread keeps running with normal priority.
#[cfg(target_os = "linux")]
pub fn fast_thread_hook(prio: Option<i32>, cpu: Option<usize>) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        match try_apply_fifo_priority(prio) {
            Ok(p) => tracing::info!(prio = p, "RT: fast thread on SCHED_FIFO"),
            Err(err) => tracing::warn!(
                error = %err,
                prio = ?prio,
                "sched_setscheduler(SCHED_FIFO) failed"
            ),
        }
        if let Some(cpu) = cpu {
            match try_apply_affinity(cpu) {
                Ok(()) => tracing::info!(cpu, "RT: fast thread pinned"),
                Err(err) => tracing::warn!(error = %err, "affinity not applied"),
            }
        }
    })
}

#[cfg(not(target_os = "linux"))]
pub fn fast_thread_hook(_prio: Option<i32>, _cpu: Option<usize>) -> Box<dyn FnOnce() + Send> {
    Box::new(|| {})
}
