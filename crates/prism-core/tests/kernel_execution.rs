//! Integration tests for the device kernel execution model
//!
//! Atomic counters, barrier-ordered local memory, and the two-phase
//! reduction, driven end to end through compile → allocate → dispatch →
//! read-back.

use prism_backends::{Args, Extent, MemFence, Result as KernelResult, ScalarType, WorkItem};
use prism_core::{accelerator_target, CompiledKernel, Executor};

#[test]
fn atomic_add_counts_every_work_item() {
    let kernel = CompiledKernel::compile(
        "atomic_add",
        accelerator_target(),
        &[ScalarType::I64],
        |_item: &WorkItem, args: &Args| -> KernelResult<()> {
            let counter = args.buffer::<i64>(0)?;
            counter.atomic_add(0usize, 1)?;
            Ok(())
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let buf = exec.allocate::<i64>(1).unwrap();

    kernel.dispatch(&mut exec, Extent::d1(100), None, &[buf.as_arg()]).unwrap();
    assert_eq!(buf.to_vec(&exec).unwrap()[0], 100);
}

#[test]
fn atomic_sub_drains_the_counter() {
    let kernel = CompiledKernel::compile(
        "atomic_sub",
        accelerator_target(),
        &[ScalarType::I64],
        |_item: &WorkItem, args: &Args| -> KernelResult<()> {
            args.buffer::<i64>(0)?.atomic_sub(0usize, 1)?;
            Ok(())
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut buf = exec.allocate::<i64>(1).unwrap();
    buf.copy_from_slice(&mut exec, &[100]).unwrap();

    kernel.dispatch(&mut exec, Extent::d1(100), None, &[buf.as_arg()]).unwrap();
    assert_eq!(buf.to_vec(&exec).unwrap()[0], 0);
}

#[test]
fn atomic_add_on_local_memory_2d() {
    // Each work-item copies its cell into a (4, 8) local block, atomically
    // increments it, and writes it back after a barrier.
    let kernel = CompiledKernel::compile(
        "local_atomic_add_2d",
        accelerator_target(),
        &[ScalarType::U32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let ary = args.buffer_shaped::<u32>(0, &[4, 8])?;
            let (tx, ty) = (item.local_id(0), item.local_id(1));
            let lm = item.local_alloc::<u32>(vec![4, 8])?;

            lm.store((tx, ty), ary.load((tx, ty))?)?;
            item.barrier(MemFence::Global);
            lm.atomic_add((tx, ty), 1)?;
            item.barrier(MemFence::Global);
            ary.store((tx, ty), lm.load((tx, ty))?)
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut buf = exec.allocate::<u32>(32).unwrap();
    let orig: Vec<u32> = (0..32).map(|i| (i * 7) % 32).collect();
    buf.copy_from_slice(&mut exec, &orig).unwrap();

    kernel
        .dispatch(&mut exec, Extent::d2(4, 8), Some(Extent::d2(4, 8)), &[buf.as_arg()])
        .unwrap();

    let expected: Vec<u32> = orig.iter().map(|v| v + 1).collect();
    assert_eq!(buf.to_vec(&exec).unwrap(), expected);
}

#[test]
fn barrier_orders_read_before_write() {
    // Every item reads its element, the group synchronizes on a local-memory
    // fence, then every item writes back the doubled value.
    let kernel = CompiledKernel::compile(
        "twice",
        accelerator_target(),
        &[ScalarType::F32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let a = args.buffer::<f32>(0)?;
            let i = item.global_id(0);
            let d = a.load(i)?;
            item.barrier(MemFence::Local);
            a.store(i, d * 2.0)
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut buf = exec.allocate::<f32>(256).unwrap();
    let orig: Vec<f32> = (0..256).map(|i| i as f32 * 0.5).collect();
    buf.copy_from_slice(&mut exec, &orig).unwrap();

    kernel
        .dispatch(&mut exec, Extent::d1(256), Some(Extent::d1(128)), &[buf.as_arg()])
        .unwrap();

    let result = buf.to_vec(&exec).unwrap();
    for (got, want) in result.iter().zip(orig.iter().map(|v| v * 2.0)) {
        assert_eq!(*got, want);
    }
}

#[test]
fn barrier_with_default_fence() {
    // No explicit scope: defaults to a global-memory fence.
    let kernel = CompiledKernel::compile(
        "twice_default_fence",
        accelerator_target(),
        &[ScalarType::F32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let a = args.buffer::<f32>(0)?;
            let i = item.global_id(0);
            let d = a.load(i)?;
            item.barrier_default();
            a.store(i, d * 2.0)
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut buf = exec.allocate::<f32>(256).unwrap();
    buf.copy_from_slice(&mut exec, &vec![1.5; 256]).unwrap();

    kernel
        .dispatch(&mut exec, Extent::d1(256), Some(Extent::d1(128)), &[buf.as_arg()])
        .unwrap();
    assert_eq!(buf.to_vec(&exec).unwrap(), vec![3.0; 256]);
}

#[test]
fn local_memory_reverses_one_group() {
    // The whole global extent fits in one work-group: stage through local
    // memory, synchronize, and write the mirror element back reversed.
    const BLOCK: usize = 10;

    let kernel = CompiledKernel::compile(
        "reverse_array",
        accelerator_target(),
        &[ScalarType::F32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let a = args.buffer::<f32>(0)?;
            let lm = item.local_alloc::<f32>(vec![BLOCK])?;
            let i = item.global_id(0);

            lm.store(i, a.load(i)?)?;
            item.barrier(MemFence::Local);
            a.store(i, lm.load(BLOCK - 1 - i)?)
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut buf = exec.allocate::<f32>(BLOCK).unwrap();
    let orig: Vec<f32> = (0..BLOCK).map(|i| i as f32).collect();
    buf.copy_from_slice(&mut exec, &orig).unwrap();

    kernel
        .dispatch(&mut exec, Extent::d1(BLOCK), Some(Extent::d1(BLOCK)), &[buf.as_arg()])
        .unwrap();

    let expected: Vec<f32> = orig.iter().rev().copied().collect();
    assert_eq!(buf.to_vec(&exec).unwrap(), expected);
}

#[test]
fn two_phase_reduction_sums_1024_ones() {
    const GLOBAL: usize = 1024;
    const GROUP: usize = 64;
    const GROUPS: usize = GLOBAL / GROUP;

    // Phase one on the device: tree-reduce each work-group in local memory
    // with halving strides, one partial sum per group.
    let kernel = CompiledKernel::compile(
        "sum_reduction",
        accelerator_target(),
        &[ScalarType::I32, ScalarType::I32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let inp = args.buffer::<i32>(0)?;
            let partial_sums = args.buffer::<i32>(1)?;

            let local_id = item.local_id(0);
            let global_id = item.global_id(0);
            let group_size = item.local_size(0);
            let group_id = item.group_id(0);

            let local_sums = item.local_alloc::<i32>(vec![GROUP])?;

            // Copy from global to local memory
            local_sums.store(local_id, inp.load(global_id)?)?;

            // Tree reduction: halve the active stride until one value is left
            let mut stride = group_size / 2;
            while stride > 0 {
                item.barrier(MemFence::Local);
                if local_id < stride {
                    let sum = local_sums.load(local_id)? + local_sums.load(local_id + stride)?;
                    local_sums.store(local_id, sum)?;
                }
                stride /= 2;
            }

            if local_id == 0 {
                partial_sums.store(group_id, local_sums.load(0usize)?)?;
            }
            Ok(())
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let mut inp = exec.allocate::<i32>(GLOBAL).unwrap();
    let partial = exec.allocate::<i32>(GROUPS).unwrap();
    inp.copy_from_slice(&mut exec, &vec![1; GLOBAL]).unwrap();

    kernel
        .dispatch(
            &mut exec,
            Extent::d1(GLOBAL),
            Some(Extent::d1(GROUP)),
            &[inp.as_arg(), partial.as_arg()],
        )
        .unwrap();

    // Phase two on the host: sum the per-group partials.
    let partials = partial.to_vec(&exec).unwrap();
    assert_eq!(partials.len(), GROUPS);
    let final_sum: i32 = partials.iter().sum();
    assert_eq!(final_sum, GLOBAL as i32);
}

#[test]
fn indivisible_local_extent_is_a_configuration_error() {
    let kernel = CompiledKernel::compile(
        "noop",
        accelerator_target(),
        &[],
        |_item: &WorkItem, _args: &Args| -> KernelResult<()> { Ok(()) },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();

    // 100 work-items cannot be partitioned into groups of 64.
    let err = kernel
        .dispatch(&mut exec, Extent::d1(100), Some(Extent::d1(64)), &[])
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("dimension 0"), "error names the dimension: {msg}");
    assert!(msg.contains("100") && msg.contains("64"), "error names both extents: {msg}");

    // The same geometry divided evenly succeeds.
    kernel.dispatch(&mut exec, Extent::d1(128), Some(Extent::d1(64)), &[]).unwrap();
}

#[test]
fn divisibility_holds_iff_every_dimension_divides() {
    let kernel = CompiledKernel::compile(
        "noop2d",
        accelerator_target(),
        &[],
        |_item: &WorkItem, _args: &Args| -> KernelResult<()> { Ok(()) },
    )
    .unwrap();
    let mut exec = Executor::new_auto().unwrap();

    for (global, local, ok) in [
        (Extent::d2(8, 8), Extent::d2(4, 4), true),
        (Extent::d2(8, 8), Extent::d2(4, 3), false),
        (Extent::d2(9, 8), Extent::d2(4, 4), false),
        (Extent::d2(12, 6), Extent::d2(6, 6), true),
    ] {
        let result = kernel.dispatch(&mut exec, global, Some(local), &[]);
        assert_eq!(result.is_ok(), ok, "global {global}, local {local}");
    }
}

#[test]
fn work_groups_cover_multi_group_launches() {
    // 8 groups of 32: every item records its group, proving group geometry
    // and global indexing agree.
    let kernel = CompiledKernel::compile(
        "record_groups",
        accelerator_target(),
        &[ScalarType::U32],
        |item: &WorkItem, args: &Args| -> KernelResult<()> {
            let out = args.buffer::<u32>(0)?;
            out.store(item.global_id(0), item.group_id(0) as u32)
        },
    )
    .unwrap();

    let mut exec = Executor::new_auto().unwrap();
    let buf = exec.allocate::<u32>(256).unwrap();

    kernel
        .dispatch(&mut exec, Extent::d1(256), Some(Extent::d1(32)), &[buf.as_arg()])
        .unwrap();

    let result = buf.to_vec(&exec).unwrap();
    for (i, &group) in result.iter().enumerate() {
        assert_eq!(group, (i / 32) as u32);
    }
}
