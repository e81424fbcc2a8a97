//! Debug-time invariant checks, tagged the way the source's own asserts were
//! (INV-<area>-<n>) so a violation report can be traced back to the specific
//! clause in the design doc that it enforces.
//!
//! Violations are routed through [`debug_fail`] rather than asserting
//! directly, so a test can install a non-aborting hook and observe that a
//! violation was reported instead of the test process dying.

use std::sync::{Mutex, OnceLock};

type FailHook = Box<dyn Fn(&str) + Send + Sync>;

static FAIL_HOOK: OnceLock<Mutex<FailHook>> = OnceLock::new();

fn hook() -> &'static Mutex<FailHook> {
    FAIL_HOOK.get_or_init(|| Mutex::new(Box::new(default_fail)))
}

fn default_fail(detail: &str) {
    panic!("invariant violation: {detail}");
}

/// Report a detected invariant violation. The default hook panics; tests may
/// install their own via [`set_debug_fail_hook`] to assert the failure was
/// reported without aborting the test binary.
pub fn debug_fail(detail: &str) {
    let guard = hook().lock().unwrap_or_else(|e| e.into_inner());
    (guard)(detail);
}

/// Install a hook invoked on invariant violation, replacing the default
/// panic. Intended for tests only.
pub fn set_debug_fail_hook<F>(f: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let mut guard = hook().lock().unwrap_or_else(|e| e.into_inner());
    *guard = Box::new(f);
}

/// Restore the default (panicking) hook.
pub fn reset_debug_fail_hook() {
    set_debug_fail_hook(default_fail);
}

/// INV-RQ-01: cumulative pops must never exceed cumulative pushes.
macro_rules! debug_assert_pops_le_pushes {
    ($pushed:expr, $popped:expr) => {
        if $popped > $pushed {
            $crate::invariants::debug_fail(&format!(
                "INV-RQ-01: popped ({}) exceeds pushed ({})",
                $popped, $pushed
            ));
        }
    };
}

/// INV-RQ-02: a freshly drained ring's running checksum must be zero.
macro_rules! debug_assert_empty_checksum_zero {
    ($is_empty:expr, $debug_sum:expr) => {
        if $is_empty && $debug_sum != 0 {
            $crate::invariants::debug_fail(&format!(
                "INV-RQ-02: debug_sum ({}) non-zero on empty ring",
                $debug_sum
            ));
        }
    };
}

/// INV-RQ-03: a slot's guard sentinel must match before the slot is consumed.
macro_rules! debug_assert_guard_matches {
    ($guard:expr, $sentinel:expr, $index:expr) => {
        if $guard != $sentinel {
            $crate::invariants::debug_fail(&format!(
                "INV-RQ-03: guard mismatch at slot {} (found {:#x}, expected {:#x})",
                $index, $guard, $sentinel
            ));
        }
    };
}

/// INV-SCHED-01: `ticks` must advance by exactly one per yield.
macro_rules! debug_assert_tick_advanced_by_one {
    ($before:expr, $after:expr) => {
        if $after != $before.wrapping_add(1) {
            $crate::invariants::debug_fail(&format!(
                "INV-SCHED-01: ticks advanced from {} to {}, expected +1",
                $before, $after
            ));
        }
    };
}

/// INV-SCHED-02: active ticks must never exceed total ticks.
macro_rules! debug_assert_active_le_total {
    ($active:expr, $total:expr) => {
        if $active > $total {
            $crate::invariants::debug_fail(&format!(
                "INV-SCHED-02: cpu_active_ticks ({}) exceeds cpu_total_ticks ({})",
                $active, $total
            ));
        }
    };
}

/// INV-PS-01: a topic's queue count must stay strictly below its capacity.
macro_rules! debug_assert_queue_count_bounded {
    ($count:expr, $cap:expr) => {
        if $count >= $cap {
            $crate::invariants::debug_fail(&format!(
                "INV-PS-01: queue count ({}) not strictly below capacity ({})",
                $count, $cap
            ));
        }
    };
}

pub(crate) use debug_assert_active_le_total;
pub(crate) use debug_assert_empty_checksum_zero;
pub(crate) use debug_assert_guard_matches;
pub(crate) use debug_assert_pops_le_pushes;
pub(crate) use debug_assert_queue_count_bounded;
pub(crate) use debug_assert_tick_advanced_by_one;
