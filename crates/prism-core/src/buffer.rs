//! Typed buffer handles over device memory
//!
//! A `Buffer<T>` wraps a backend handle and provides safe, typed host
//! transfers. Buffers are allocated through an [`crate::executor::Executor`]
//! and their lifecycle is tied to the executor's device memory. Kernels
//! never see a `Buffer<T>` directly; launches take the type-erased
//! [`crate::executor::LaunchArg`] obtained from [`Buffer::as_arg`].

use std::marker::PhantomData;
use std::time::Instant;

use prism_backends::{BufferHandle, DeviceElem};
use prism_tracing::performance::record_transfer;

use crate::error::{Error, Result};
use crate::executor::{Executor, LaunchArg};

/// Typed buffer handle
///
/// `T` must be a device element type, which implies `bytemuck::Pod` for safe
/// zero-copy host transfers.
pub struct Buffer<T> {
    handle: BufferHandle,
    len: usize,
    _phantom: PhantomData<T>,
}

impl<T: DeviceElem> Buffer<T> {
    /// Create a buffer wrapping an allocated handle
    ///
    /// `pub(crate)` because only [`Executor::allocate`] can guarantee the
    /// handle's size matches `len`.
    pub(crate) fn new(handle: BufferHandle, len: usize) -> Self {
        Self {
            handle,
            len,
            _phantom: PhantomData,
        }
    }

    /// Backend handle
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get element size in bytes
    pub fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Get total size in bytes
    pub fn size_bytes(&self) -> usize {
        self.len * self.element_size()
    }

    /// This buffer as a kernel launch argument
    pub fn as_arg(&self) -> LaunchArg {
        LaunchArg::new(self.handle, T::SCALAR, self.len)
    }

    /// Copy data from host slice to buffer (H2D transfer)
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length doesn't match the buffer length.
    #[tracing::instrument(skip(self, exec, src), fields(
        handle = %self.handle,
        elements = src.len(),
        type_name = std::any::type_name::<T>()
    ))]
    pub fn copy_from_slice(&mut self, exec: &mut Executor, src: &[T]) -> Result<()> {
        if src.len() != self.len() {
            return Err(Error::BufferSizeMismatch {
                expected: self.len(),
                actual: src.len(),
            });
        }

        let start = Instant::now();
        exec.write_buffer_data(self, src)?;
        record_transfer(std::mem::size_of_val(src), "H2D", start.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Copy data from buffer to host slice (D2H transfer)
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length doesn't match the buffer length.
    #[tracing::instrument(skip(self, exec, dst), fields(
        handle = %self.handle,
        elements = self.len,
        type_name = std::any::type_name::<T>()
    ))]
    pub fn copy_to_slice(&self, exec: &Executor, dst: &mut [T]) -> Result<()> {
        if dst.len() != self.len() {
            return Err(Error::BufferSizeMismatch {
                expected: self.len(),
                actual: dst.len(),
            });
        }

        let start = Instant::now();
        let data = exec.read_buffer_data(self)?;
        dst.copy_from_slice(&data);
        record_transfer(self.size_bytes(), "D2H", start.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Copy buffer contents to a Vec (D2H transfer)
    #[tracing::instrument(skip(self, exec), fields(
        handle = %self.handle,
        elements = self.len,
        type_name = std::any::type_name::<T>()
    ))]
    pub fn to_vec(&self, exec: &Executor) -> Result<Vec<T>> {
        let start = Instant::now();
        let data = exec.read_buffer_data(self)?;
        record_transfer(self.size_bytes(), "D2H", start.elapsed().as_micros() as u64);
        Ok(data)
    }
}

impl<T: DeviceElem> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            len: self.len,
            _phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_backends::ScalarType;

    #[test]
    fn test_buffer_basic_properties() {
        let mut exec = Executor::new().unwrap();
        let buf = exec.allocate::<f32>(1024).unwrap();

        assert_eq!(buf.len(), 1024);
        assert!(!buf.is_empty());
        assert_eq!(buf.element_size(), 4);
        assert_eq!(buf.size_bytes(), 4096);
    }

    #[test]
    fn test_buffer_as_arg_carries_type() {
        let mut exec = Executor::new().unwrap();
        let buf = exec.allocate::<u32>(16).unwrap();

        let arg = buf.as_arg();
        assert_eq!(arg.scalar(), ScalarType::U32);
        assert_eq!(arg.len(), 16);
        assert_eq!(arg.handle(), buf.handle());
    }

    #[test]
    fn test_copy_from_slice_size_mismatch() {
        let mut exec = Executor::new().unwrap();
        let mut buf = exec.allocate::<f32>(1024).unwrap();
        let data = vec![1.0f32; 512]; // Wrong size

        match buf.copy_from_slice(&mut exec, &data) {
            Err(Error::BufferSizeMismatch { expected, actual }) => {
                assert_eq!(expected, 1024);
                assert_eq!(actual, 512);
            }
            other => panic!("expected BufferSizeMismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_copy_to_slice_roundtrip() {
        let mut exec = Executor::new().unwrap();
        let mut buf = exec.allocate::<f32>(16).unwrap();

        let test_data: Vec<f32> = (0..16).map(|i| i as f32 * 2.5).collect();
        buf.copy_from_slice(&mut exec, &test_data).unwrap();

        let mut dst = vec![0.0f32; 16];
        buf.copy_to_slice(&exec, &mut dst).unwrap();
        assert_eq!(dst, test_data);
    }

    #[test]
    fn test_fresh_buffer_is_zeroed() {
        let mut exec = Executor::new().unwrap();
        let buf = exec.allocate::<i64>(8).unwrap();
        assert_eq!(buf.to_vec(&exec).unwrap(), vec![0i64; 8]);
    }

    #[test]
    fn test_multiple_writes() {
        let mut exec = Executor::new().unwrap();
        let mut buf = exec.allocate::<f32>(8).unwrap();

        let data1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        buf.copy_from_slice(&mut exec, &data1).unwrap();
        assert_eq!(buf.to_vec(&exec).unwrap()[0], 1.0);

        let mut data2 = data1.clone();
        data2[0] = 99.0;
        buf.copy_from_slice(&mut exec, &data2).unwrap();

        let result = buf.to_vec(&exec).unwrap();
        assert_eq!(result[0], 99.0);
        assert_eq!(result[1], 2.0);
    }

    #[test]
    fn test_buffer_clone_aliases_handle() {
        let mut exec = Executor::new().unwrap();
        let buf1 = exec.allocate::<u8>(32).unwrap();
        let buf2 = buf1.clone();
        assert_eq!(buf1.handle(), buf2.handle());
        assert_eq!(buf1.len(), buf2.len());
    }
}
