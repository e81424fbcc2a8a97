//! Cooperative single-thread task scheduler.
//!
//! The source multiplexes tasks by saving/restoring a per-task execution
//! buffer (`saved_context`/`local_stack`) by hand. Rust already has a
//! compiler-generated state machine for exactly this shape: an `async fn`.
//! This module picks option (c) from the design notes — state-machine-per-task
//! — and drives it with a small hand-rolled executor rather than `tokio`,
//! since the scheduling policy below (`find_next_task`) is a bespoke,
//! deterministic, tick-exact selection rule that a general-purpose async
//! runtime's waker-driven scheduling can't reproduce.
//!
//! `yield_now().await` and `sleep(n).await`, obtained from a [`SchedulerHandle`],
//! are the only suspension points, matching the source's `scheduler_yield`/
//! `scheduler_sleep` contract exactly.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::config::Config;
use crate::error::{Result, RtError};
use crate::invariants::{debug_assert_active_le_total, debug_assert_tick_advanced_by_one};
use crate::metrics::SchedulerMetrics;

struct TaskSlot {
    future: Option<Pin<Box<dyn Future<Output = ()>>>>,
    /// 0 ⇒ runnable; non-zero ⇒ asleep until `ticks` reaches this value
    /// (wrap-safe modular comparison).
    wake_tick: u16,
    /// Whether the task has been polled at least once. Mirrors the source's
    /// `started` field; not currently read, kept for data-model fidelity and
    /// as a natural place to hang future diagnostics.
    #[allow(dead_code)]
    started: bool,
}

struct Inner {
    tasks: Vec<Option<TaskSlot>>,
    current: Option<usize>,
    ticks: u16,
    cpu_total_ticks: u64,
    cpu_active_ticks: u64,
    idle_task_id: Option<usize>,
}

/// Wrap-safe "is this wake tick due" check: treats `ticks - wake_tick` as a
/// signed 16-bit modular difference and considers the task due iff that
/// difference is non-negative (the unsigned difference falls in the lower
/// half of the range). Mirrors the source's `(unsigned short)(ticks - wake)
/// < 0x8000u` idiom.
fn tick_is_due(ticks: u16, wake_tick: u16) -> bool {
    ticks.wrapping_sub(wake_tick) < 0x8000
}

fn slot_is_runnable(slot: &TaskSlot, ticks: u16) -> bool {
    slot.wake_tick == 0 || tick_is_due(ticks, slot.wake_tick)
}

/// Three-pass task selection given the previously running task's slot index.
///
/// 1. Starting just after `prev`, visit all in-use tasks once, skipping the
///    idle task; return the first runnable one.
/// 2. If none found, return the idle task if it is runnable.
/// 3. Else return the first runnable task of any kind, in slot order.
/// 4. Else `None` (nothing left to run).
fn find_next_task(inner: &Inner) -> Option<usize> {
    let n = inner.tasks.len();
    if n == 0 {
        return None;
    }
    let prev = inner.current.unwrap_or(n - 1);

    for offset in 1..=n {
        let idx = (prev + offset) % n;
        if inner.idle_task_id == Some(idx) {
            continue;
        }
        if let Some(slot) = &inner.tasks[idx] {
            if slot_is_runnable(slot, inner.ticks) {
                return Some(idx);
            }
        }
    }

    if let Some(idle_id) = inner.idle_task_id {
        if let Some(slot) = &inner.tasks[idle_id] {
            if slot_is_runnable(slot, inner.ticks) {
                return Some(idle_id);
            }
        }
    }

    for (idx, slot) in inner.tasks.iter().enumerate() {
        if let Some(slot) = slot {
            if slot_is_runnable(slot, inner.ticks) {
                return Some(idx);
            }
        }
    }

    None
}

/// A cooperative task runtime: a fixed-size task table plus tick accounting.
///
/// Not `Send`/`Sync` — matches the single-threaded cooperative model the
/// source implements; there is exactly one physical execution resource and
/// the scheduler itself is not meant to be shared across OS threads.
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
    metrics: Rc<SchedulerMetrics>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut tasks = Vec::with_capacity(config.max_tasks);
        tasks.resize_with(config.max_tasks, || None);
        Self {
            inner: Rc::new(RefCell::new(Inner {
                tasks,
                current: None,
                ticks: 0,
                cpu_total_ticks: 0,
                cpu_active_ticks: 0,
                idle_task_id: None,
            })),
            metrics: Rc::new(SchedulerMetrics::new()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Allocates the first free task slot and builds the task's future from
    /// a [`SchedulerHandle`] bound to that slot's id. Returns `None` if the
    /// task table is full.
    pub fn add<F, Fut>(&self, make: F) -> Option<usize>
    where
        F: FnOnce(SchedulerHandle) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.tasks.iter().position(Option::is_none)?;
            inner.tasks[id] = Some(TaskSlot {
                future: None,
                wake_tick: 0,
                started: false,
            });
            id
        };

        let handle = SchedulerHandle {
            inner: Rc::clone(&self.inner),
            metrics: Rc::clone(&self.metrics),
            task_id: id,
        };
        let fut = make(handle);

        let mut inner = self.inner.borrow_mut();
        inner.tasks[id].as_mut().unwrap().future = Some(Box::pin(fut));
        drop(inner);

        self.metrics.tasks_added.fetch_add(1, Ordering::Relaxed);
        Some(id)
    }

    /// Same as [`Scheduler::add`]. The source's `scheduler_add_once` sets a
    /// `one_shot` flag that is written but never read anywhere in the
    /// original scheduler — every task, one-shot or not, is already removed
    /// on return. Kept as an explicit alias rather than silently dropped so
    /// the call site reads the same as the source.
    pub fn add_once<F, Fut>(&self, make: F) -> Option<usize>
    where
        F: FnOnce(SchedulerHandle) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        self.add(make)
    }

    /// Deactivates a task slot. A suspended task in that slot never resumes.
    pub fn remove(&self, id: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if id >= inner.tasks.len() {
            return Err(RtError::InvalidArgument(format!("task id {id} out of range")));
        }
        inner.tasks[id] = None;
        if inner.idle_task_id == Some(id) {
            inner.idle_task_id = None;
        }
        Ok(())
    }

    /// Marks a task's ticks as excluded from `cpu_active_ticks`.
    pub fn set_idle_task(&self, id: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if id >= inner.tasks.len() || inner.tasks[id].is_none() {
            return Err(RtError::InvalidArgument(format!("task id {id} out of range")));
        }
        inner.idle_task_id = Some(id);
        Ok(())
    }

    #[must_use]
    pub fn get_idle_task(&self) -> Option<usize> {
        self.inner.borrow().idle_task_id
    }

    #[must_use]
    pub fn get_ticks(&self) -> u16 {
        self.inner.borrow().ticks
    }

    #[must_use]
    pub fn cpu_active_ticks(&self) -> u64 {
        self.inner.borrow().cpu_active_ticks
    }

    #[must_use]
    pub fn cpu_total_ticks(&self) -> u64 {
        self.inner.borrow().cpu_total_ticks
    }

    /// `active * 100 / total`, capped at 100; 0 when `total == 0`.
    #[must_use]
    pub fn cpu_usage_percent(&self) -> u32 {
        let inner = self.inner.borrow();
        if inner.cpu_total_ticks == 0 {
            return 0;
        }
        let pct = (inner.cpu_active_ticks * 100) / inner.cpu_total_ticks;
        pct.min(100) as u32
    }

    /// Drives every runnable task to completion. Returns once no task
    /// remains runnable (all slots empty, or all remaining tasks asleep
    /// forever — callers are responsible for ensuring forward progress).
    pub fn run(&self) {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        loop {
            let next_id = {
                let inner = self.inner.borrow();
                find_next_task(&inner)
            };
            let Some(id) = next_id else { break };

            // Take the future out of the RefCell before polling it: the
            // future's own `.await` points (YieldNow/Sleep) need to borrow
            // `inner` themselves, and polling while still holding a borrow
            // would panic on the re-entrant borrow_mut.
            let mut fut = {
                let mut inner = self.inner.borrow_mut();
                inner.current = Some(id);
                let slot = inner.tasks[id].as_mut().expect("selected task slot vanished");
                slot.started = true;
                slot.future.take().expect("task future missing mid-poll")
            };

            let poll = fut.as_mut().poll(&mut cx);

            let mut inner = self.inner.borrow_mut();
            match poll {
                Poll::Ready(()) => {
                    inner.tasks[id] = None;
                    if inner.idle_task_id == Some(id) {
                        inner.idle_task_id = None;
                    }
                    drop(inner);
                    self.metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
                }
                Poll::Pending => {
                    if let Some(slot) = inner.tasks[id].as_mut() {
                        slot.future = Some(fut);
                    }
                    let before = inner.ticks;
                    inner.ticks = inner.ticks.wrapping_add(1);
                    debug_assert_tick_advanced_by_one!(before, inner.ticks);
                    inner.cpu_total_ticks += 1;
                    if inner.idle_task_id != Some(id) {
                        inner.cpu_active_ticks += 1;
                    }
                    debug_assert_active_le_total!(inner.cpu_active_ticks, inner.cpu_total_ticks);
                    drop(inner);
                    self.metrics.yields.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// A cloneable reference to a scheduler, bound to a specific task slot.
/// Passed into a task's async body so it can call [`yield_now`](SchedulerHandle::yield_now)
/// and [`sleep`](SchedulerHandle::sleep).
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Rc<RefCell<Inner>>,
    metrics: Rc<SchedulerMetrics>,
    task_id: usize,
}

impl SchedulerHandle {
    #[must_use]
    pub fn get_ticks(&self) -> u16 {
        self.inner.borrow().ticks
    }

    /// Suspends the calling task for exactly one scheduler tick.
    #[must_use]
    pub fn yield_now(&self) -> YieldNow {
        YieldNow { polled: false }
    }

    /// Sets the calling task's wake tick to `ticks + max(1, delta)`, then
    /// suspends until the scheduler observes the tick counter has reached
    /// it. `sleep(0)` behaves as `sleep(1)`.
    #[must_use]
    pub fn sleep(&self, delta: u16) -> SleepFuture {
        SleepFuture {
            handle: self.clone(),
            delta,
            armed: false,
        }
    }

    /// Deactivates another task's slot from within a running task. Useful
    /// for a supervisor/driver task that tears down otherwise-infinite
    /// peers once its own exit condition is reached.
    pub fn remove(&self, id: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if id >= inner.tasks.len() {
            return Err(RtError::InvalidArgument(format!("task id {id} out of range")));
        }
        inner.tasks[id] = None;
        if inner.idle_task_id == Some(id) {
            inner.idle_task_id = None;
        }
        Ok(())
    }
}

/// Suspends exactly once, resuming on the next time this task is selected.
pub struct YieldNow {
    polled: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.polled {
            Poll::Ready(())
        } else {
            this.polled = true;
            Poll::Pending
        }
    }
}

pub struct SleepFuture {
    handle: SchedulerHandle,
    delta: u16,
    armed: bool,
}

impl Future for SleepFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if !this.armed {
            let mut inner = this.handle.inner.borrow_mut();
            let ticks = inner.ticks;
            let wake = ticks.wrapping_add(this.delta.max(1));
            if let Some(slot) = inner.tasks[this.handle.task_id].as_mut() {
                slot.wake_tick = wake;
            }
            drop(inner);
            this.armed = true;
            this.handle.metrics.sleeps.fetch_add(1, Ordering::Relaxed);
            return Poll::Pending;
        }

        // By the time the scheduler selects this task again, `find_next_task`
        // has already verified the wake tick is due — clear it and resume.
        let mut inner = this.handle.inner.borrow_mut();
        if let Some(slot) = inner.tasks[this.handle.task_id].as_mut() {
            slot.wake_tick = 0;
        }
        Poll::Ready(())
    }
}

/// SAFETY: the waker is never actually used to wake anything — this
/// executor re-polls tasks based on its own `find_next_task` selection, not
/// on waker notifications — so every vtable function is a no-op and cloning
/// just produces another no-op waker. There is no data behind the raw
/// pointer to free or read.
fn noop_waker() -> Waker {
    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        raw_waker()
    }
    fn raw_waker() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    unsafe { Waker::from_raw(raw_waker()) }
}
