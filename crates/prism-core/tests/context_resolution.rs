//! Integration tests for context resolution through the public API
//!
//! Covers singleton stability, override isolation and restoration, and the
//! pairing invariant, using the process-wide target descriptors the way a
//! compilation pipeline would.

use std::sync::{Arc, Barrier};

use prism_core::{accelerator_target, host_target};
use prism_targets::{ContextPair, TargetContext, TargetDescriptor, TargetError, TargetKind, TypingContext};

fn fresh_pair(kind: TargetKind) -> (Arc<TypingContext>, Arc<TargetContext>) {
    let typing = Arc::new(TypingContext::build_default(kind).unwrap());
    let target = Arc::new(TargetContext::build_default(Arc::clone(&typing)).unwrap());
    (typing, target)
}

#[test]
fn singleton_stability_across_repeated_access() {
    let first_typing = host_target().typing_context().unwrap();
    let first_target = host_target().target_context().unwrap();

    for _ in 0..100 {
        assert!(Arc::ptr_eq(&host_target().typing_context().unwrap(), &first_typing));
        assert!(Arc::ptr_eq(&host_target().target_context().unwrap(), &first_target));
    }
}

#[test]
fn host_and_accelerator_targets_are_independent() {
    let host_typing = host_target().typing_context().unwrap();
    let accel_typing = accelerator_target().typing_context().unwrap();
    assert!(!Arc::ptr_eq(&host_typing, &accel_typing));

    let host_ctx = host_target().target_context().unwrap();
    let accel_ctx = accelerator_target().target_context().unwrap();
    assert!(!Arc::ptr_eq(&host_ctx, &accel_ctx));
    assert!(Arc::ptr_eq(host_ctx.typing(), &host_typing));
    assert!(Arc::ptr_eq(accel_ctx.typing(), &accel_typing));
}

#[test]
fn concurrent_first_access_yields_one_pair() {
    // A dedicated descriptor so this test controls first access.
    let descriptor = Arc::new(TargetDescriptor::new(TargetKind::Accelerator));
    let start = Arc::new(Barrier::new(16));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let descriptor = Arc::clone(&descriptor);
        let start = Arc::clone(&start);
        handles.push(std::thread::spawn(move || {
            start.wait();
            let typing = descriptor.typing_context().unwrap();
            let target = descriptor.target_context().unwrap();
            assert!(Arc::ptr_eq(target.typing(), &typing));
            (typing, target)
        }));
    }

    let pairs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (typing, target) in &pairs[1..] {
        assert!(Arc::ptr_eq(typing, &pairs[0].0));
        assert!(Arc::ptr_eq(target, &pairs[0].1));
    }
}

#[test]
fn override_is_invisible_to_other_threads() {
    let descriptor = Arc::new(TargetDescriptor::new(TargetKind::Host));
    let base = descriptor.typing_context().unwrap();
    let (typing, target) = fresh_pair(TargetKind::Host);

    let installed = Arc::new(Barrier::new(2));
    let released = Arc::new(Barrier::new(2));

    let observer = {
        let descriptor = Arc::clone(&descriptor);
        let base = Arc::clone(&base);
        let installed = Arc::clone(&installed);
        let released = Arc::clone(&released);
        std::thread::spawn(move || {
            installed.wait();
            assert!(Arc::ptr_eq(&descriptor.typing_context().unwrap(), &base));
            released.wait();
        })
    };

    {
        let _scope = descriptor.nested(Arc::clone(&typing), Arc::clone(&target)).unwrap();
        assert!(Arc::ptr_eq(&descriptor.typing_context().unwrap(), &typing));
        installed.wait();
        released.wait();
    }

    observer.join().unwrap();
    assert!(Arc::ptr_eq(&descriptor.typing_context().unwrap(), &base));
}

#[test]
fn deeply_nested_overrides_unwind_to_the_original() {
    let descriptor = TargetDescriptor::new(TargetKind::Host);
    let original = descriptor.context_pair().unwrap();

    fn recurse(descriptor: &TargetDescriptor, depth: usize) {
        if depth == 0 {
            return;
        }
        let typing = Arc::new(TypingContext::build_default(TargetKind::Host).unwrap());
        let target = Arc::new(TargetContext::build_default(Arc::clone(&typing)).unwrap());
        let _scope = descriptor.nested(Arc::clone(&typing), target).unwrap();
        assert!(Arc::ptr_eq(&descriptor.typing_context().unwrap(), &typing));
        recurse(descriptor, depth - 1);
        // After the inner scopes exit, this level's override is active again.
        assert!(Arc::ptr_eq(&descriptor.typing_context().unwrap(), &typing));
    }

    recurse(&descriptor, 32);
    assert_eq!(descriptor.override_depth(), 0);
    assert!(descriptor.context_pair().unwrap().same_as(&original));
}

#[test]
fn override_restored_when_an_error_propagates() {
    let descriptor = TargetDescriptor::new(TargetKind::Accelerator);
    let before = descriptor.context_pair().unwrap();

    fn compile_with_override(descriptor: &TargetDescriptor) -> Result<(), TargetError> {
        let (typing, target) = {
            let typing = Arc::new(TypingContext::build_default(TargetKind::Accelerator).unwrap());
            let target = Arc::new(TargetContext::build_default(Arc::clone(&typing)).unwrap());
            (typing, target)
        };
        let _scope = descriptor.nested(typing, target)?;
        // A failing compilation step inside the scope.
        Err(TargetError::construction("lowering failed"))
    }

    assert!(compile_with_override(&descriptor).is_err());
    assert_eq!(descriptor.override_depth(), 0);
    assert!(descriptor.context_pair().unwrap().same_as(&before));
}

#[test]
fn foreign_pairing_is_rejected_everywhere() {
    let (typing_a, target_a) = fresh_pair(TargetKind::Host);
    let (typing_b, target_b) = fresh_pair(TargetKind::Host);

    assert!(ContextPair::new(Arc::clone(&typing_a), Arc::clone(&target_a)).is_ok());
    assert!(ContextPair::new(Arc::clone(&typing_b), Arc::clone(&target_b)).is_ok());

    assert!(matches!(
        ContextPair::new(typing_a, target_b),
        Err(TargetError::ContextMismatch { .. })
    ));

    let descriptor = TargetDescriptor::new(TargetKind::Host);
    assert!(matches!(
        descriptor.nested(typing_b, target_a),
        Err(TargetError::ContextMismatch { .. })
    ));
}

#[test]
fn compilation_under_override_uses_the_substituted_pair() {
    use prism_backends::{Args, Result as KernelResult, WorkItem};
    use prism_core::CompiledKernel;

    let descriptor = TargetDescriptor::new(TargetKind::Accelerator);
    let (typing, target) = fresh_pair(TargetKind::Accelerator);

    let body = |_item: &WorkItem, _args: &Args| -> KernelResult<()> { Ok(()) };

    let compiled_under_override = {
        let _scope = descriptor.nested(Arc::clone(&typing), Arc::clone(&target)).unwrap();
        CompiledKernel::compile("scoped", &descriptor, &[], body).unwrap()
    };
    assert!(Arc::ptr_eq(compiled_under_override.governing_pair().typing(), &typing));

    let compiled_after = CompiledKernel::compile("unscoped", &descriptor, &[], body).unwrap();
    assert!(!Arc::ptr_eq(compiled_after.governing_pair().typing(), &typing));
    assert!(Arc::ptr_eq(
        compiled_after.governing_pair().typing(),
        &descriptor.typing_context().unwrap()
    ));
}
