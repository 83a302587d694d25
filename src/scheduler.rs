//! # Kernel Core
//!
//! The kernel state and the full-served trap loop. All syscall work happens
//! here, on the kernel's own stack: a task publishes a request into its
//! descriptor, traps in through `arch::enter_kernel`, and the loop services
//! the request before exiting to whichever task the dispatcher picks.
//!
//! ## Trap loop
//!
//! ```text
//! run():
//!     dispatch()                 pick the first task
//!     loop {
//!         current.request = None
//!         CURRENT_SP = current.sp
//!         exit_kernel()          task runs until its next trap
//!         current.sp = CURRENT_SP
//!         service(current.request)
//!     }
//! ```
//!
//! `Create`, `Suspend` and `Resume` return to the caller without a
//! redispatch; `Terminate`, `Sleep`, `Yield` (and a bare re-entry with no
//! request, which a tick preemption can produce) hand the CPU to the next
//! READY task in round-robin order.
//!
//! The loop runs with interrupts masked. The only windows where they open
//! are the dispatcher's idle wait and the whole time a task is running.

use crate::arch;
use crate::config::MAX_TASKS;
use crate::log::{ktrace, kwarn};
use crate::task::{
    KernelError, KernelRequest, Pid, Priority, ProcessDescriptor, TaskFn, TaskState,
};

// ---------------------------------------------------------------------------
// Kernel state
// ---------------------------------------------------------------------------

/// The entire kernel state: process table, dispatch cursor, PID counter and
/// the error cell. Stored as a single global in `kernel.rs`; every kernel
/// routine is a method on this struct so the state has one owner and a
/// defined init path.
pub struct Scheduler {
    /// Fixed-size process table. A slot in state `Dead` is free.
    pub tasks: [ProcessDescriptor; MAX_TASKS],

    /// Index of the descriptor that currently owns the CPU (or owned it
    /// last, while the kernel itself is executing).
    pub current: usize,

    /// Round-robin scan cursor into the process table.
    pub next_cursor: usize,

    /// Number of non-`Dead` descriptors.
    pub task_count: usize,

    /// Highest PID issued so far. Monotonically non-decreasing; PIDs are
    /// never reissued within a boot.
    pub last_pid: Pid,

    /// True once `start` has entered the trap loop.
    pub kernel_active: bool,

    /// Outcome of the most recent kernel operation.
    pub err: KernelError,
}

impl Scheduler {
    /// A kernel with an empty process table.
    pub const fn new() -> Self {
        Self {
            tasks: [ProcessDescriptor::EMPTY; MAX_TASKS],
            current: 0,
            next_cursor: 0,
            task_count: 0,
            last_pid: 0,
            kernel_active: false,
            err: KernelError::NoErr,
        }
    }

    // -----------------------------------------------------------------------
    // Task table & PID registry
    // -----------------------------------------------------------------------

    /// Build a new task in the first free slot.
    ///
    /// Reached from the trap loop for a `Create` request, or directly from
    /// the facade while the kernel is not yet active. Records `MaxProcess`
    /// in the error cell when the table is full, `NoErr` otherwise.
    pub fn create_task(&mut self, entry: TaskFn, priority: Priority, arg: i32) {
        if self.task_count == MAX_TASKS {
            kwarn!("create: process table full");
            self.err = KernelError::MaxProcess;
            return;
        }

        // task_count counts non-Dead slots, so a free one must exist.
        let Some(slot) = self
            .tasks
            .iter()
            .position(|pd| pd.state == TaskState::Dead)
        else {
            self.err = KernelError::MaxProcess;
            return;
        };

        self.task_count += 1;
        self.last_pid += 1;

        let pd = &mut self.tasks[slot];
        pd.workspace.clear();
        let sp = arch::init_stack(&mut pd.workspace, entry);
        pd.sp = sp;
        pd.pid = self.last_pid;
        pd.priority = priority;
        pd.arg = arg;
        pd.request = KernelRequest::None;
        pd.request_arg = 0;
        pd.code = Some(entry);
        pd.state = TaskState::Ready;

        ktrace!("create: pid {} in slot {}", self.last_pid, slot);
        self.err = KernelError::NoErr;
    }

    /// Descriptor of the slot carrying `pid`, if any. A plain linear scan:
    /// a terminated slot keeps its PID until recycled, so a lookup against
    /// it still resolves and the caller's state check reports the mismatch.
    fn task_by_pid(&mut self, pid: Pid) -> Option<&mut ProcessDescriptor> {
        self.tasks.iter_mut().find(|pd| pd.pid == pid)
    }

    /// PID recorded for `entry`, from the first slot whose task was built
    /// from that function.
    pub fn pid_of(&self, entry: TaskFn) -> Option<Pid> {
        self.tasks
            .iter()
            .find(|pd| pd.code == Some(entry))
            .map(|pd| pd.pid)
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    /// Select the next READY task, promote it to RUNNING and advance the
    /// round-robin cursor past it.
    ///
    /// When a full pass over the table finds nothing READY, the scan parks
    /// in `arch::idle_wait`, which opens the interrupt window so the tick
    /// can promote a sleeper, then resumes scanning.
    pub fn dispatch(&mut self) {
        let mut scanned = 0;
        while self.tasks[self.next_cursor].state != TaskState::Ready {
            self.next_cursor = (self.next_cursor + 1) % MAX_TASKS;
            scanned += 1;
            if scanned > MAX_TASKS {
                arch::idle_wait();
                scanned = 0;
            }
        }

        self.current = self.next_cursor;
        self.tasks[self.current].state = TaskState::Running;
        self.next_cursor = (self.next_cursor + 1) % MAX_TASKS;
    }

    // -----------------------------------------------------------------------
    // Tick handler
    // -----------------------------------------------------------------------

    /// Periodic tick: count down every SLEEPING task and promote the
    /// expired ones to READY.
    ///
    /// Runs from the tick ISR with interrupts masked. Touches nothing but
    /// SLEEPING descriptors — in particular not `current`, which need not
    /// be valid while the kernel is idle-waiting.
    pub fn tick(&mut self) {
        for pd in self.tasks.iter_mut() {
            if pd.state == TaskState::Sleeping {
                pd.request_arg -= 1;
                if pd.request_arg <= 0 {
                    pd.state = TaskState::Ready;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Request services
    // -----------------------------------------------------------------------

    /// Suspend the task named by the caller's `request_arg`. The target
    /// must be READY; the caller keeps the CPU either way.
    fn suspend_task(&mut self) {
        let target = self.tasks[self.current].request_arg as Pid;

        self.err = match self.task_by_pid(target) {
            None => {
                kwarn!("suspend: pid {} not in process table", target);
                KernelError::PidNotFound
            }
            Some(pd) if pd.state != TaskState::Ready => {
                kwarn!("suspend: pid {} is not READY", target);
                KernelError::SuspendNonready
            }
            Some(pd) => {
                pd.state = TaskState::Suspended;
                KernelError::NoErr
            }
        };
    }

    /// Resume the task named by the caller's `request_arg`. The target
    /// must be SUSPENDED; the caller keeps the CPU either way.
    fn resume_task(&mut self) {
        let target = self.tasks[self.current].request_arg as Pid;

        self.err = match self.task_by_pid(target) {
            None => {
                kwarn!("resume: pid {} not in process table", target);
                KernelError::PidNotFound
            }
            Some(pd) if pd.state != TaskState::Suspended => {
                kwarn!("resume: pid {} is not SUSPENDED", target);
                KernelError::ResumeNonsuspended
            }
            Some(pd) => {
                pd.state = TaskState::Ready;
                KernelError::NoErr
            }
        };
    }

    /// Service the request the current task trapped in with.
    pub fn service(&mut self) {
        match self.tasks[self.current].request {
            KernelRequest::Create => {
                // The facade staged the new task's parameters in the
                // caller's own descriptor before trapping.
                let pd = &self.tasks[self.current];
                let (code, priority, arg) = (pd.code, pd.priority, pd.arg);
                match code {
                    Some(entry) => self.create_task(entry, priority, arg),
                    None => {
                        kwarn!("create request with no entry function");
                        self.err = KernelError::InvalidKernelRequest;
                    }
                }
            }

            KernelRequest::Terminate => {
                let pd = &mut self.tasks[self.current];
                ktrace!("terminate: pid {}", pd.pid);
                // The slot becomes recyclable; its PID is never reissued.
                pd.state = TaskState::Dead;
                self.task_count -= 1;
                self.dispatch();
            }

            KernelRequest::Suspend => self.suspend_task(),

            KernelRequest::Resume => self.resume_task(),

            KernelRequest::Sleep => {
                // request_arg holds the remaining tick count; the tick
                // handler counts it down while the task sleeps.
                self.tasks[self.current].state = TaskState::Sleeping;
                self.dispatch();
            }

            // A bare re-entry with no request means the task was preempted
            // by the tick without asking for anything; treat it as a yield.
            KernelRequest::Yield | KernelRequest::None => {
                self.tasks[self.current].state = TaskState::Ready;
                self.dispatch();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Trap loop
    // -----------------------------------------------------------------------

    /// The kernel's main loop. Dispatches an initial task, then forever:
    /// exit to the current task, re-enter on its next trap, service the
    /// request. Never returns.
    pub fn run(&mut self) -> ! {
        self.dispatch();

        loop {
            {
                let pd = &mut self.tasks[self.current];
                pd.request = KernelRequest::None;
                // request_arg is deliberately left alone: a task trapping
                // in with Sleep keeps its remaining tick count there.
                unsafe {
                    crate::kernel::CURRENT_SP = pd.sp;
                }
            }

            unsafe {
                arch::exit_kernel();
                // The task ran until its next trap; its stack pointer came
                // back through the scratch cell.
                self.tasks[self.current].sp = crate::kernel::CURRENT_SP;
            }

            self.service();
        }
    }
}

/// Landing point for a task whose entry function returned. The port's
/// launcher branches here; the task ends as if it had called terminate.
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
pub(crate) extern "C" fn task_exit() -> ! {
    crate::kernel::terminate();
    // terminate only declines before `start`, which cannot apply to a task
    // the kernel itself launched.
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TASKS;

    extern "C" fn entry_a() {}
    extern "C" fn entry_b() {}
    extern "C" fn entry_c() {}

    /// Kernel with `n` READY tasks built from `entry_a`/`entry_b`/`entry_c`
    /// (cycling), none dispatched yet.
    fn kernel_with(n: usize) -> Scheduler {
        let entries = [entry_a as TaskFn, entry_b as TaskFn, entry_c as TaskFn];
        let mut k = Scheduler::new();
        for i in 0..n {
            k.create_task(entries[i % entries.len()], 10, 0);
            assert_eq!(k.err, KernelError::NoErr);
        }
        k
    }

    /// Model one trap: publish a request into the running descriptor and
    /// service it, exactly as the trap loop would after `enter_kernel`.
    fn trap(k: &mut Scheduler, request: KernelRequest, arg: i32) {
        let cur = k.current;
        k.tasks[cur].request = request;
        k.tasks[cur].request_arg = arg;
        k.service();
    }

    fn running_count(k: &Scheduler) -> usize {
        k.tasks
            .iter()
            .filter(|pd| pd.state == TaskState::Running)
            .count()
    }

    fn running_pid(k: &Scheduler) -> Pid {
        k.tasks[k.current].pid
    }

    #[test]
    fn pids_are_issued_monotonically_from_one() {
        let k = kernel_with(3);
        let pids: [Pid; 3] = core::array::from_fn(|i| k.tasks[i].pid);
        assert_eq!(pids, [1, 2, 3]);
        assert_eq!(k.last_pid, 3);
    }

    #[test]
    fn round_robin_dispatch_order() {
        // S1: three tasks yielding forever run in creation order, cyclically.
        let mut k = kernel_with(3);
        k.dispatch();

        let mut order = [0u32; 6];
        for slot in order.iter_mut() {
            *slot = running_pid(&k);
            trap(&mut k, KernelRequest::Yield, 0);
        }
        assert_eq!(order, [1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn at_most_one_task_is_running() {
        let mut k = kernel_with(3);
        k.dispatch();
        assert_eq!(running_count(&k), 1);

        trap(&mut k, KernelRequest::Yield, 0);
        assert_eq!(running_count(&k), 1);

        trap(&mut k, KernelRequest::Sleep, 3);
        assert_eq!(running_count(&k), 1);

        trap(&mut k, KernelRequest::Terminate, 0);
        assert_eq!(running_count(&k), 1);
    }

    #[test]
    fn every_live_task_stack_pointer_stays_in_its_workspace() {
        let k = kernel_with(MAX_TASKS);
        for pd in k.tasks.iter() {
            assert!(pd.state != TaskState::Dead);
            assert!(pd.sp_in_workspace());
        }
    }

    #[test]
    fn sleep_counts_down_and_wakes_on_expiry() {
        // S2 at the tick level: sleep(5) wakes on the fifth tick, not before.
        let mut k = kernel_with(2);
        k.dispatch();
        let sleeper = k.current;

        trap(&mut k, KernelRequest::Sleep, 5);
        assert_eq!(k.tasks[sleeper].state, TaskState::Sleeping);
        assert_ne!(k.current, sleeper);

        for remaining in (1..5).rev() {
            k.tick();
            assert_eq!(k.tasks[sleeper].state, TaskState::Sleeping);
            assert_eq!(k.tasks[sleeper].request_arg, remaining);
        }
        k.tick();
        assert_eq!(k.tasks[sleeper].state, TaskState::Ready);

        // The woken task is picked up again on the next yield of the other.
        trap(&mut k, KernelRequest::Yield, 0);
        assert_eq!(k.current, sleeper);
    }

    #[test]
    fn tick_touches_only_sleeping_descriptors() {
        let mut k = kernel_with(3);
        k.dispatch();

        // One running, one sleeping, one ready.
        trap(&mut k, KernelRequest::Sleep, 10);
        let snapshot: [(TaskState, i32); MAX_TASKS] = core::array::from_fn(|i| {
            (k.tasks[i].state, k.tasks[i].request_arg)
        });

        k.tick();

        for (i, (state, arg)) in snapshot.iter().enumerate() {
            if *state == TaskState::Sleeping {
                assert_eq!(k.tasks[i].request_arg, arg - 1);
            } else {
                assert_eq!(k.tasks[i].state, *state);
                assert_eq!(k.tasks[i].request_arg, *arg);
            }
        }
    }

    #[test]
    fn suspend_resume_window() {
        // S3 at the state level: a suspended task misses its turns until
        // resumed, then rejoins the rotation.
        let mut k = kernel_with(3);
        k.dispatch();
        assert_eq!(running_pid(&k), 1);

        let pong = k.pid_of(entry_b).unwrap();
        trap(&mut k, KernelRequest::Suspend, pong as i32);
        assert_eq!(k.err, KernelError::NoErr);
        assert_eq!(running_pid(&k), 1); // caller kept the CPU

        // Rotation now skips pong: 1 -> 3 -> 1.
        trap(&mut k, KernelRequest::Yield, 0);
        assert_eq!(running_pid(&k), 3);
        trap(&mut k, KernelRequest::Yield, 0);
        assert_eq!(running_pid(&k), 1);

        trap(&mut k, KernelRequest::Resume, pong as i32);
        assert_eq!(k.err, KernelError::NoErr);

        // Pong takes its slot in the rotation again.
        trap(&mut k, KernelRequest::Yield, 0);
        assert_eq!(running_pid(&k), 2);
    }

    #[test]
    fn table_full_sets_max_process_error() {
        // S4: the table holds MAX_TASKS tasks and not one more.
        let mut k = kernel_with(MAX_TASKS);
        assert_eq!(k.task_count, MAX_TASKS);

        k.create_task(entry_a, 5, 0);
        assert_eq!(k.err, KernelError::MaxProcess);
        assert_eq!(k.task_count, MAX_TASKS);
        assert_eq!(k.last_pid, MAX_TASKS as Pid);
    }

    #[test]
    fn suspending_the_running_caller_is_refused() {
        // S5: the caller is RUNNING, not READY, so self-suspend errors out
        // and the caller keeps running.
        let mut k = kernel_with(2);
        k.dispatch();
        let me = running_pid(&k);

        trap(&mut k, KernelRequest::Suspend, me as i32);
        assert_eq!(k.err, KernelError::SuspendNonready);
        assert_eq!(running_pid(&k), me);
        assert_eq!(k.tasks[k.current].state, TaskState::Running);
    }

    #[test]
    fn unknown_pid_is_reported() {
        // S6.
        let mut k = kernel_with(2);
        k.dispatch();

        trap(&mut k, KernelRequest::Resume, 9999);
        assert_eq!(k.err, KernelError::PidNotFound);

        trap(&mut k, KernelRequest::Suspend, 9999);
        assert_eq!(k.err, KernelError::PidNotFound);
    }

    #[test]
    fn suspend_and_resume_of_a_terminated_pid_report_the_state_mismatch() {
        let mut k = kernel_with(2);
        k.dispatch();
        let gone = running_pid(&k);

        trap(&mut k, KernelRequest::Terminate, 0);

        // The dead slot still carries its PID, so the lookup finds it and
        // the state check fails; this is not a missing-PID case.
        trap(&mut k, KernelRequest::Suspend, gone as i32);
        assert_eq!(k.err, KernelError::SuspendNonready);

        trap(&mut k, KernelRequest::Resume, gone as i32);
        assert_eq!(k.err, KernelError::ResumeNonsuspended);
    }

    #[test]
    fn resume_of_a_ready_task_is_refused() {
        let mut k = kernel_with(2);
        k.dispatch();
        let other = k.pid_of(entry_b).unwrap();

        trap(&mut k, KernelRequest::Resume, other as i32);
        assert_eq!(k.err, KernelError::ResumeNonsuspended);
        assert_eq!(k.tasks[1].state, TaskState::Ready);
    }

    #[test]
    fn terminate_recycles_the_slot_but_not_the_pid() {
        let mut k = kernel_with(2);
        k.dispatch();
        let gone = running_pid(&k);

        trap(&mut k, KernelRequest::Terminate, 0);
        assert_eq!(k.task_count, 1);

        // The freed slot hosts the next task, under a fresh PID.
        k.create_task(entry_c, 3, 7);
        assert_eq!(k.err, KernelError::NoErr);
        assert_eq!(k.task_count, 2);
        assert_eq!(k.last_pid, 3);
        assert_ne!(k.last_pid, gone);

        let recycled = k
            .tasks
            .iter()
            .find(|pd| pd.pid == 3)
            .expect("new task exists");
        assert_eq!(recycled.state, TaskState::Ready);
        assert_eq!(recycled.arg, 7);
        assert!(recycled.sp_in_workspace());
    }

    #[test]
    fn table_refills_after_terminations() {
        // With terminate decrementing the live count, slot recycling works
        // beyond MAX_TASKS lifetime creations.
        let mut k = kernel_with(MAX_TASKS);
        k.dispatch();

        for _ in 0..MAX_TASKS {
            trap(&mut k, KernelRequest::Terminate, 0);
            k.create_task(entry_a, 10, 0);
            assert_eq!(k.err, KernelError::NoErr);
        }
        assert_eq!(k.task_count, MAX_TASKS);
        assert_eq!(k.last_pid, 2 * MAX_TASKS as Pid);
    }

    #[test]
    fn create_request_builds_from_staged_parameters() {
        // After start, Task parameters travel through the caller's own
        // descriptor; the caller keeps the CPU.
        let mut k = kernel_with(1);
        k.dispatch();
        let caller = k.current;

        k.tasks[caller].code = Some(entry_c);
        k.tasks[caller].priority = 4;
        k.tasks[caller].arg = 42;
        trap(&mut k, KernelRequest::Create, 0);

        assert_eq!(k.err, KernelError::NoErr);
        assert_eq!(k.task_count, 2);
        assert_eq!(k.tasks[caller].state, TaskState::Running);

        let new = k.task_by_pid(2).expect("created task exists");
        assert_eq!(new.state, TaskState::Ready);
        assert_eq!(new.priority, 4);
        assert_eq!(new.arg, 42);
        assert_eq!(new.code, Some(entry_c as TaskFn));
    }

    #[test]
    fn bare_reentry_counts_as_yield() {
        let mut k = kernel_with(2);
        k.dispatch();
        let first = k.current;

        trap(&mut k, KernelRequest::None, 0);
        assert_eq!(k.tasks[first].state, TaskState::Ready);
        assert_ne!(k.current, first);
    }

    #[test]
    fn pid_lookup_by_entry_function() {
        let k = kernel_with(3);
        assert_eq!(k.pid_of(entry_a), Some(1));
        assert_eq!(k.pid_of(entry_b), Some(2));
        assert_eq!(k.pid_of(entry_c), Some(3));

        extern "C" fn stranger() {}
        assert_eq!(k.pid_of(stranger), None);
    }
}
