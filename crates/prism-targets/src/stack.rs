//! Thread-local override stacks
//!
//! Each thread keeps one stack of context-pair overrides per target
//! descriptor. Overrides on one thread are invisible to every other thread;
//! only explicit lexical nesting within one thread's call stack is
//! supported, to unbounded depth.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::context::ContextPair;

thread_local! {
    static OVERRIDES: RefCell<HashMap<u64, Vec<ContextPair>>> = RefCell::new(HashMap::new());
}

/// Push `pair` as the calling thread's top override for descriptor
/// `descriptor_id`
pub(crate) fn push(descriptor_id: u64, pair: ContextPair) {
    OVERRIDES.with(|stacks| {
        stacks.borrow_mut().entry(descriptor_id).or_default().push(pair);
    });
}

/// Pop the calling thread's top override for `descriptor_id`, restoring the
/// previous one (or the "no override" state)
pub(crate) fn pop(descriptor_id: u64) -> Option<ContextPair> {
    OVERRIDES.with(|stacks| {
        let mut stacks = stacks.borrow_mut();
        let stack = stacks.get_mut(&descriptor_id)?;
        let popped = stack.pop();
        if stack.is_empty() {
            stacks.remove(&descriptor_id);
        }
        popped
    })
}

/// The calling thread's current top override for `descriptor_id`, if any
pub(crate) fn top(descriptor_id: u64) -> Option<ContextPair> {
    OVERRIDES.with(|stacks| stacks.borrow().get(&descriptor_id).and_then(|s| s.last().cloned()))
}

/// Current override depth for `descriptor_id` on the calling thread
pub(crate) fn depth(descriptor_id: u64) -> usize {
    OVERRIDES.with(|stacks| stacks.borrow().get(&descriptor_id).map_or(0, |s| s.len()))
}
