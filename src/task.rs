//! # Process Descriptor
//!
//! Defines the task model: the per-slot process descriptor, the task
//! lifecycle state machine, the kernel request tags a task uses to trap
//! into the kernel, and the closed error enumeration.
//!
//! ## Lifecycle
//!
//! ```text
//!   ┌──────┐  create   ┌───────┐  dispatch  ┌─────────┐
//!   │ Dead │ ────────► │ Ready │ ─────────► │ Running │
//!   └──────┘           └───────┘            └─────────┘
//!      ▲                ▲  ▲  ▲                 │
//!      │      terminate │  │  │ resume          │ yield
//!      └────────────────┼──┼──┴───────────┐     │
//!                  tick │  └──────────────┼─────┤ suspend(target)
//!            ┌──────────┴┐            ┌───┴─────▼─┐
//!            │  Sleeping │ ◄───sleep──┤ Suspended │ (target was Ready)
//!            └───────────┘            └───────────┘
//! ```
//!
//! A slot begins `Dead`; `Dead` doubles as "slot is free". Slots are
//! recycled, PIDs never are.

use crate::config::STACK_SIZE;

/// Unique task identifier, assigned monotonically at creation.
/// 0 is reserved and means "no task"; the smallest valid PID is 1.
pub type Pid = u32;

/// Task priority, 0 (highest) to [`crate::config::MIN_PRIORITY`] (lowest).
/// Recorded in the descriptor; the round-robin dispatcher ignores it.
pub type Priority = u8;

/// Entry function of a task. A task normally never returns; one that does
/// is caught by the port's terminate sentinel and ends up `Dead`.
pub type TaskFn = extern "C" fn();

// ---------------------------------------------------------------------------
// State machine and request tags
// ---------------------------------------------------------------------------

/// Lifecycle state of a process-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Slot holds no live task. The only recyclable state.
    Dead,
    /// Task is runnable and waiting for the dispatcher.
    Ready,
    /// Task is executing on the CPU. At most one slot is ever `Running`.
    Running,
    /// Task was suspended by another task and is not schedulable.
    Suspended,
    /// Task is waiting for its sleep countdown to expire.
    Sleeping,
}

/// Pending system call, published into the running descriptor before the
/// task traps into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelRequest {
    /// No request pending. Seen by the kernel when a task re-enters
    /// without publishing one; treated as a yield.
    None,
    /// Create a new task from the parameters staged in the caller's
    /// descriptor.
    Create,
    /// Give up the CPU voluntarily.
    Yield,
    /// End the calling task.
    Terminate,
    /// Suspend the task named by `request_arg`.
    Suspend,
    /// Resume the task named by `request_arg`.
    Resume,
    /// Sleep for the number of ticks held in `request_arg`.
    Sleep,
}

/// Closed error enumeration. Kernel operations record their outcome here
/// rather than panicking; syscall wrappers read the cell back after the
/// trap returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelError {
    /// The previous kernel operation completed normally.
    NoErr,
    /// The trap loop saw a request tag it does not service.
    InvalidKernelRequest,
    /// A syscall was invoked before `start`; the call was a no-op.
    KernelInactive,
    /// The process table has no free slot.
    MaxProcess,
    /// No live task carries the requested PID.
    PidNotFound,
    /// Suspend target was not in the `Ready` state.
    SuspendNonready,
    /// Resume target was not in the `Suspended` state.
    ResumeNonsuspended,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Per-task workspace. The buffer is the task's stack; AAPCS requires the
/// stack pointer to be 8-byte aligned at every public call boundary, so the
/// buffer itself is 8-byte aligned.
#[repr(align(8))]
pub struct Stack([u8; STACK_SIZE]);

impl Stack {
    /// An all-zero workspace.
    pub const fn new() -> Self {
        Self([0; STACK_SIZE])
    }

    /// Address one past the highest byte of the workspace. Stacks grow
    /// downward from here.
    pub fn top(&self) -> usize {
        self.0.as_ptr() as usize + STACK_SIZE
    }

    /// Address of the lowest byte of the workspace.
    pub fn base(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Zero the workspace. Done on task creation so a recycled slot never
    /// leaks the previous occupant's stack contents.
    pub fn clear(&mut self) {
        self.0 = [0; STACK_SIZE];
    }
}

// ---------------------------------------------------------------------------
// Process descriptor
// ---------------------------------------------------------------------------

/// One slot of the process table: everything the kernel knows about a task.
///
/// Descriptors live in a fixed array inside the kernel state — no heap.
/// The `sp` field points into `workspace` whenever the slot is not `Dead`
/// and the task is not the one currently running on the CPU.
pub struct ProcessDescriptor {
    /// Unique positive PID; 0 while the slot is `Dead`.
    pub pid: Pid,

    /// Recorded priority, 0 (highest) to 10 (lowest). Not consulted by
    /// the dispatcher.
    pub priority: Priority,

    /// Current lifecycle state.
    pub state: TaskState,

    /// Request published by the task before its last trap.
    pub request: KernelRequest,

    /// Request argument, interpreted per request: remaining sleep ticks
    /// for `Sleep` (decremented by the tick handler while `Sleeping`),
    /// target PID for `Suspend`/`Resume`.
    pub request_arg: i32,

    /// Entry argument recorded at creation. Retrieval is stubbed; see
    /// [`crate::kernel::get_arg`].
    pub arg: i32,

    /// Saved stack pointer while the task is off the CPU.
    pub sp: *mut u32,

    /// The task's stack memory.
    pub workspace: Stack,

    /// Entry function; `None` until the slot has hosted a task.
    pub code: Option<TaskFn>,
}

// Safety: `sp` always points into this descriptor's own `workspace`, and
// descriptors are only touched from kernel context or the tick ISR, both
// of which run with interrupts masked.
unsafe impl Send for ProcessDescriptor {}
unsafe impl Sync for ProcessDescriptor {}

impl ProcessDescriptor {
    /// A `Dead` slot, usable to initialize the static table.
    pub const EMPTY: Self = Self {
        pid: 0,
        priority: 0,
        state: TaskState::Dead,
        request: KernelRequest::None,
        request_arg: 0,
        arg: 0,
        sp: core::ptr::null_mut(),
        workspace: Stack::new(),
        code: None,
    };

    /// Whether `sp` currently points inside this descriptor's workspace.
    pub fn sp_in_workspace(&self) -> bool {
        let sp = self.sp as usize;
        sp >= self.workspace.base() && sp < self.workspace.top()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
