//! Lock-free LIFO handoff stack (Treiber stack).
//!
//! Used by the worker pool to hand idle-worker tokens from a finishing worker
//! back to the dispatcher without taking a lock.
//!
//! ## Architecture
//!
//! ```text
//!   head (Atomic<Node>)
//!     │
//!     ▼
//!   ┌────────┐    ┌────────┐    ┌────────┐
//!   │ tok_C  │───►│ tok_B  │───►│ tok_A  │───► null
//!   └────────┘    └────────┘    └────────┘
//!
//!   push(x):  node.next = head;  CAS(head: old → node)   retry on failure
//!   pop():    h = head;          CAS(head: h → h.next)   retry on failure
//! ```
//!
//! ## Memory Reclamation
//!
//! Every push allocates a fresh node. Popped nodes are retired through
//! `crossbeam_epoch` and freed only once no thread pinned before the pop can
//! still observe them, so a node address is never recycled while a
//! concurrent `pop` holds it (no ABA).
//!
//! ## Example Usage
//!
//! ```
//! use surgekit::ds::HandoffStack;
//!
//! let stack = HandoffStack::new();
//! stack.push(1);
//! stack.push(2);
//!
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(1));
//! assert_eq!(stack.pop(), None);
//! ```
//!
//! ## Performance
//!
//! - `push`: lock-free, one allocation + one successful CAS
//! - `pop`: lock-free, one successful CAS + deferred free
//! - `len`: O(1), approximate while other threads are pushing/popping

use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned};

struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

/// Lock-free LIFO stack with epoch-based node reclamation.
///
/// `push` never blocks and never fails; `pop` returns `None` when the stack is
/// observed empty.
pub struct HandoffStack<T> {
    head: Atomic<Node<T>>,
    len: AtomicUsize,
}

// SAFETY: values are moved in by `push` and moved out by exactly one `pop`;
// the stack never hands out shared references to `T`.
unsafe impl<T: Send> Send for HandoffStack<T> {}
unsafe impl<T: Send> Sync for HandoffStack<T> {}

impl<T> HandoffStack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
            len: AtomicUsize::new(0),
        }
    }

    /// Pushes `value` on top of the stack.
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });

        // Counted before publishing so a racing pop never takes `len` below 0.
        self.len.fetch_add(1, Ordering::Relaxed);
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Relaxed, &guard);
            node.next.store(head, Ordering::Relaxed);

            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => break,
                Err(err) => node = err.new,
            }
        }
    }

    /// Pops the most recently pushed value.
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            // SAFETY: `head` was loaded under `guard`; it cannot be freed
            // until the guard is dropped.
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Ordering::Relaxed, &guard);

            if self
                .head
                .compare_exchange(head, next, Ordering::Relaxed, Ordering::Relaxed, &guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: the successful CAS unlinked `head`, so this thread
                // is the only one that moves the value out. The node itself
                // is destroyed after all current pins are released, and
                // `ManuallyDrop` keeps that destruction from dropping `value`.
                unsafe {
                    let value = ptr::read(&node.value);
                    guard.defer_destroy(head);
                    return Some(ManuallyDrop::into_inner(value));
                }
            }
        }
    }

    /// Returns the number of values on the stack.
    ///
    /// Exact when no other thread is pushing or popping.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if the stack was observed empty.
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Pops every value currently on the stack, most recent first.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(value) = self.pop() {
            out.push(value);
        }
        out
    }
}

impl<T> Default for HandoffStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandoffStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffStack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for HandoffStack<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can access the stack, so
        // walking it without pinning is sound.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            while !current.is_null() {
                let mut node = current.into_owned();
                current = node.next.load(Ordering::Relaxed, guard);
                ManuallyDrop::drop(&mut node.value);
            }
        }
    }
}
