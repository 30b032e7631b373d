//! Kernel compilation and dispatch
//!
//! `CompiledKernel::compile` is where the context-resolution layer meets the
//! device layer: the kernel's governing `ContextPair` is resolved from a
//! `TargetDescriptor` under the compilation lock (honouring any override
//! installed on the calling thread), the declared argument signature is
//! checked against the typing context, and the target context must carry
//! lowering rules for the barrier and atomic intrinsics every kernel may
//! use. The pair that governed compilation stays attached to the kernel and
//! is observable for the lifetime of the artifact.

use std::fmt;
use std::sync::Arc;

use prism_backends::{
    Args, Extent, GroupExecutor, KernelBody, LaunchDescriptor, LaunchReport, ScalarType,
};
use prism_targets::{ContextPair, TargetDescriptor, TargetKind};
use prism_tracing::perf_span;

use crate::error::{Error, Result};
use crate::executor::{Executor, LaunchArg};

/// A device kernel compiled against one context pair
///
/// # Example
///
/// ```rust
/// use prism_backends::{Args, Extent, Result as KernelResult, ScalarType, WorkItem};
/// use prism_core::{CompiledKernel, Executor};
/// use prism_targets::accelerator_target;
///
/// # fn main() -> prism_core::Result<()> {
/// let kernel = CompiledKernel::compile(
///     "double",
///     accelerator_target(),
///     &[ScalarType::F32],
///     |item: &WorkItem, args: &Args| -> KernelResult<()> {
///         let data = args.buffer::<f32>(0)?;
///         let i = item.global_id(0);
///         let v = data.load(i)?;
///         data.store(i, v * 2.0)
///     },
/// )?;
///
/// let mut exec = Executor::new_auto()?;
/// let mut buf = exec.allocate::<f32>(8)?;
/// buf.copy_from_slice(&mut exec, &[1.0; 8])?;
///
/// kernel.dispatch(&mut exec, Extent::d1(8), None, &[buf.as_arg()])?;
/// assert_eq!(buf.to_vec(&exec)?, vec![2.0; 8]);
/// # Ok(())
/// # }
/// ```
pub struct CompiledKernel {
    name: String,
    target: TargetKind,
    signature: Vec<ScalarType>,
    pair: ContextPair,
    body: Arc<dyn KernelBody>,
}

impl CompiledKernel {
    /// Compile a kernel body against a target descriptor
    ///
    /// Resolves the governing context pair on the calling thread (an active
    /// override substitutes its pair transparently), checks every declared
    /// argument type against the typing context, and verifies the target
    /// context lowers the `barrier` and `atomic_rmw` intrinsics.
    ///
    /// # Errors
    ///
    /// `UnsupportedArgType` for a signature the typing context rejects;
    /// `MissingIntrinsic` when the target context cannot lower a kernel
    /// primitive; context construction failures propagate unmodified.
    pub fn compile(
        name: impl Into<String>,
        descriptor: &TargetDescriptor,
        signature: &[ScalarType],
        body: impl KernelBody + 'static,
    ) -> Result<Self> {
        let name = name.into();
        let _span = perf_span!("kernel_compile");

        let pair = descriptor.context_pair()?;

        for (index, &scalar) in signature.iter().enumerate() {
            if !pair.typing().supports(scalar) {
                return Err(Error::UnsupportedArgType {
                    kernel: name,
                    index,
                    scalar,
                    target: descriptor.kind(),
                });
            }
        }
        for intrinsic in ["barrier", "atomic_rmw"] {
            if pair.target().intrinsic(intrinsic).is_none() {
                return Err(Error::MissingIntrinsic {
                    kernel: name,
                    name: intrinsic.to_string(),
                });
            }
        }

        tracing::debug!(
            kernel = %name,
            target = %descriptor.kind(),
            args = signature.len(),
            "kernel_compiled"
        );

        Ok(Self {
            name,
            target: descriptor.kind(),
            signature: signature.to_vec(),
            pair,
            body: Arc::new(body),
        })
    }

    /// Kernel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target kind this kernel was compiled for
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Declared argument signature
    pub fn signature(&self) -> &[ScalarType] {
        &self.signature
    }

    /// The context pair that governed this kernel's compilation
    pub fn governing_pair(&self) -> &ContextPair {
        &self.pair
    }

    /// Launch this kernel: `kernel[device, global, local](args)`
    ///
    /// Builds and validates the launch descriptor eagerly, checks the
    /// arguments against the declared signature, runs every work-group to
    /// completion, and returns only after the launch has retired — partial
    /// results are never observable.
    ///
    /// # Errors
    ///
    /// Configuration errors (geometry, argument count/type) before any
    /// work-item runs; otherwise the first error any work-item returns.
    pub fn dispatch(
        &self,
        exec: &mut Executor,
        global: Extent,
        local: Option<Extent>,
        args: &[LaunchArg],
    ) -> Result<LaunchReport> {
        let _span = perf_span!("kernel_dispatch", kernel = self.name.as_str());

        let device = exec.device();
        if self.target.device_kind() != device.kind() {
            return Err(Error::TargetDeviceMismatch {
                kernel: self.name.clone(),
                compiled: self.target,
                device: device.kind(),
            });
        }

        if args.len() != self.signature.len() {
            return Err(Error::ArgCountMismatch {
                kernel: self.name.clone(),
                expected: self.signature.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, &declared)) in args.iter().zip(&self.signature).enumerate() {
            if arg.scalar() != declared {
                return Err(Error::ArgTypeMismatch {
                    kernel: self.name.clone(),
                    index,
                    declared,
                    actual: arg.scalar(),
                });
            }
        }

        let launch = LaunchDescriptor::new(device.clone(), global, local)?;
        let resolved = args
            .iter()
            .map(|arg| exec.resolve_arg(arg))
            .collect::<Result<Vec<_>>>()?;
        let args = Args::new(resolved);

        let report = GroupExecutor::execute(self.body.as_ref(), &launch, &args)?;
        tracing::debug!(
            kernel = %self.name,
            work_groups = report.work_groups,
            work_items = report.work_items,
            "kernel_retired"
        );
        Ok(report)
    }
}

impl fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("signature", &self.signature)
            .finish()
    }
}
