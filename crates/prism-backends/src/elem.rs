//! Element types for device memory
//!
//! `ScalarType` is the shared type vocabulary between the context layer and
//! the device layer. `DeviceElem` ties a Rust scalar to its `ScalarType` and
//! provides relaxed atomic loads/stores so that cross-work-item visibility is
//! ordered only by barriers. `AtomicElem` adds the indivisible
//! read-modify-write primitives kernels may use without an external barrier.

use std::fmt;
use std::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering,
};

/// Scalar element types supported in device memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Size of one element in bytes
    pub const fn size_bytes(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    /// True for the integer types
    pub const fn is_integer(self) -> bool {
        !matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// True for types that support atomic read-modify-write operations
    pub const fn is_atomic(self) -> bool {
        matches!(
            self,
            ScalarType::I32 | ScalarType::U32 | ScalarType::I64 | ScalarType::U64 | ScalarType::F32 | ScalarType::F64
        )
    }

    /// All scalar types, in declaration order
    pub const ALL: [ScalarType; 10] = [
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::U8,
        ScalarType::U16,
        ScalarType::U32,
        ScalarType::U64,
        ScalarType::F32,
        ScalarType::F64,
    ];
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A Rust scalar that can live in device memory
///
/// All kernel-time accesses go through `load_relaxed`/`store_relaxed` so that
/// concurrent access from different work-items is never undefined behaviour
/// at the language level; whether a given interleaving is a *data race in the
/// kernel's own terms* remains the kernel author's contract, ordered only by
/// barriers.
///
/// # Safety
///
/// Implementations must guarantee `SCALAR.size_bytes() == size_of::<Self>()`
/// and that the atomic accesses operate on exactly that width.
pub unsafe trait DeviceElem: bytemuck::Pod + Send + Sync + 'static {
    /// The scalar type tag for this element
    const SCALAR: ScalarType;

    /// Relaxed atomic load from an element address.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid, aligned for `Self`, and inside a live device
    /// allocation. All concurrent access to the location must be atomic.
    unsafe fn load_relaxed(ptr: *mut Self) -> Self;

    /// Relaxed atomic store to an element address.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DeviceElem::load_relaxed`].
    unsafe fn store_relaxed(ptr: *mut Self, value: Self);
}

macro_rules! impl_device_elem_int {
    ($ty:ty, $atomic:ty, $scalar:expr) => {
        unsafe impl DeviceElem for $ty {
            const SCALAR: ScalarType = $scalar;

            unsafe fn load_relaxed(ptr: *mut Self) -> Self {
                <$atomic>::from_ptr(ptr).load(Ordering::Relaxed)
            }

            unsafe fn store_relaxed(ptr: *mut Self, value: Self) {
                <$atomic>::from_ptr(ptr).store(value, Ordering::Relaxed)
            }
        }
    };
}

impl_device_elem_int!(i8, AtomicI8, ScalarType::I8);
impl_device_elem_int!(i16, AtomicI16, ScalarType::I16);
impl_device_elem_int!(i32, AtomicI32, ScalarType::I32);
impl_device_elem_int!(i64, AtomicI64, ScalarType::I64);
impl_device_elem_int!(u8, AtomicU8, ScalarType::U8);
impl_device_elem_int!(u16, AtomicU16, ScalarType::U16);
impl_device_elem_int!(u32, AtomicU32, ScalarType::U32);
impl_device_elem_int!(u64, AtomicU64, ScalarType::U64);

macro_rules! impl_device_elem_float {
    ($ty:ty, $bits:ty, $atomic:ty, $scalar:expr) => {
        unsafe impl DeviceElem for $ty {
            const SCALAR: ScalarType = $scalar;

            unsafe fn load_relaxed(ptr: *mut Self) -> Self {
                let bits = <$atomic>::from_ptr(ptr as *mut $bits).load(Ordering::Relaxed);
                <$ty>::from_bits(bits)
            }

            unsafe fn store_relaxed(ptr: *mut Self, value: Self) {
                <$atomic>::from_ptr(ptr as *mut $bits).store(value.to_bits(), Ordering::Relaxed)
            }
        }
    };
}

impl_device_elem_float!(f32, u32, AtomicU32, ScalarType::F32);
impl_device_elem_float!(f64, u64, AtomicU64, ScalarType::F64);

/// A device element supporting indivisible read-modify-write updates
///
/// The update is atomic with respect to every other atomic operation on the
/// same location from any work-item, without an external barrier. Integers
/// use native fetch operations; floats use a compare-exchange loop bit-cast
/// through the same-width integer atomic.
///
/// # Safety
///
/// Same width/pointer requirements as [`DeviceElem`].
pub unsafe trait AtomicElem: DeviceElem {
    /// Atomically add `value`, returning the previous value.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DeviceElem::load_relaxed`].
    unsafe fn fetch_add(ptr: *mut Self, value: Self) -> Self;

    /// Atomically subtract `value`, returning the previous value.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DeviceElem::load_relaxed`].
    unsafe fn fetch_sub(ptr: *mut Self, value: Self) -> Self;

    /// Atomically take the minimum of the location and `value`, returning the previous value.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DeviceElem::load_relaxed`].
    unsafe fn fetch_min(ptr: *mut Self, value: Self) -> Self;

    /// Atomically take the maximum of the location and `value`, returning the previous value.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DeviceElem::load_relaxed`].
    unsafe fn fetch_max(ptr: *mut Self, value: Self) -> Self;
}

macro_rules! impl_atomic_elem_int {
    ($ty:ty, $atomic:ty) => {
        unsafe impl AtomicElem for $ty {
            unsafe fn fetch_add(ptr: *mut Self, value: Self) -> Self {
                <$atomic>::from_ptr(ptr).fetch_add(value, Ordering::Relaxed)
            }

            unsafe fn fetch_sub(ptr: *mut Self, value: Self) -> Self {
                <$atomic>::from_ptr(ptr).fetch_sub(value, Ordering::Relaxed)
            }

            unsafe fn fetch_min(ptr: *mut Self, value: Self) -> Self {
                <$atomic>::from_ptr(ptr).fetch_min(value, Ordering::Relaxed)
            }

            unsafe fn fetch_max(ptr: *mut Self, value: Self) -> Self {
                <$atomic>::from_ptr(ptr).fetch_max(value, Ordering::Relaxed)
            }
        }
    };
}

impl_atomic_elem_int!(i32, AtomicI32);
impl_atomic_elem_int!(u32, AtomicU32);
impl_atomic_elem_int!(i64, AtomicI64);
impl_atomic_elem_int!(u64, AtomicU64);

macro_rules! impl_atomic_elem_float {
    ($ty:ty, $bits:ty, $atomic:ty) => {
        unsafe impl AtomicElem for $ty {
            unsafe fn fetch_add(ptr: *mut Self, value: Self) -> Self {
                atomic_float_rmw::<$ty, $bits, $atomic, _>(ptr, |cur| cur + value)
            }

            unsafe fn fetch_sub(ptr: *mut Self, value: Self) -> Self {
                atomic_float_rmw::<$ty, $bits, $atomic, _>(ptr, |cur| cur - value)
            }

            unsafe fn fetch_min(ptr: *mut Self, value: Self) -> Self {
                atomic_float_rmw::<$ty, $bits, $atomic, _>(ptr, |cur| cur.min(value))
            }

            unsafe fn fetch_max(ptr: *mut Self, value: Self) -> Self {
                atomic_float_rmw::<$ty, $bits, $atomic, _>(ptr, |cur| cur.max(value))
            }
        }
    };
}

/// Compare-exchange loop for float read-modify-write through the same-width
/// integer atomic.
///
/// # Safety
///
/// Same requirements as [`DeviceElem::load_relaxed`].
unsafe fn atomic_float_rmw<F, B, A, O>(ptr: *mut F, op: O) -> F
where
    F: FloatBits<Bits = B>,
    B: Copy,
    A: IntegerAtomic<B>,
    O: Fn(F) -> F,
{
    let atomic = A::at(ptr as *mut B);
    let mut current = atomic.load_relaxed();
    loop {
        let next = F::to_bits(op(F::from_bits(current)));
        match atomic.compare_exchange_weak_relaxed(current, next) {
            Ok(prev) => return F::from_bits(prev),
            Err(observed) => current = observed,
        }
    }
}

/// Bit-level view of a float, used by the compare-exchange loops.
trait FloatBits: Copy {
    type Bits: Copy;
    fn to_bits(self) -> Self::Bits;
    fn from_bits(bits: Self::Bits) -> Self;
}

impl FloatBits for f32 {
    type Bits = u32;
    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }
    fn from_bits(bits: u32) -> f32 {
        f32::from_bits(bits)
    }
}

impl FloatBits for f64 {
    type Bits = u64;
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }
    fn from_bits(bits: u64) -> f64 {
        f64::from_bits(bits)
    }
}

/// The subset of integer-atomic operations the float loops need, abstracted
/// so one loop serves both widths.
trait IntegerAtomic<B> {
    /// # Safety
    ///
    /// `ptr` must be valid and aligned for the atomic width.
    unsafe fn at<'a>(ptr: *mut B) -> &'a Self;
    fn load_relaxed(&self) -> B;
    fn compare_exchange_weak_relaxed(&self, current: B, new: B) -> std::result::Result<B, B>;
}

impl IntegerAtomic<u32> for AtomicU32 {
    unsafe fn at<'a>(ptr: *mut u32) -> &'a Self {
        AtomicU32::from_ptr(ptr)
    }
    fn load_relaxed(&self) -> u32 {
        self.load(Ordering::Relaxed)
    }
    fn compare_exchange_weak_relaxed(&self, current: u32, new: u32) -> std::result::Result<u32, u32> {
        self.compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
    }
}

impl IntegerAtomic<u64> for AtomicU64 {
    unsafe fn at<'a>(ptr: *mut u64) -> &'a Self {
        AtomicU64::from_ptr(ptr)
    }
    fn load_relaxed(&self) -> u64 {
        self.load(Ordering::Relaxed)
    }
    fn compare_exchange_weak_relaxed(&self, current: u64, new: u64) -> std::result::Result<u64, u64> {
        self.compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
    }
}

impl_atomic_elem_float!(f32, u32, AtomicU32);
impl_atomic_elem_float!(f64, u64, AtomicU64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ScalarType::I8.size_bytes(), 1);
        assert_eq!(ScalarType::U16.size_bytes(), 2);
        assert_eq!(ScalarType::F32.size_bytes(), 4);
        assert_eq!(ScalarType::U64.size_bytes(), 8);
        for scalar in ScalarType::ALL {
            assert!(scalar.size_bytes() <= 8);
        }
    }

    #[test]
    fn test_scalar_atomic_capability() {
        assert!(ScalarType::U32.is_atomic());
        assert!(ScalarType::F64.is_atomic());
        assert!(!ScalarType::U8.is_atomic());
        assert!(!ScalarType::I16.is_atomic());
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(ScalarType::F32.to_string(), "f32");
        assert_eq!(ScalarType::U64.to_string(), "u64");
    }

    #[test]
    fn test_relaxed_load_store_roundtrip() {
        let mut slot = 0u32;
        unsafe {
            u32::store_relaxed(&mut slot, 1234);
            assert_eq!(u32::load_relaxed(&mut slot), 1234);
        }

        let mut fslot = 0.0f64;
        unsafe {
            f64::store_relaxed(&mut fslot, -2.5);
            assert_eq!(f64::load_relaxed(&mut fslot), -2.5);
        }
    }

    #[test]
    fn test_integer_fetch_ops() {
        let mut slot = 10u32;
        unsafe {
            assert_eq!(u32::fetch_add(&mut slot, 5), 10);
            assert_eq!(u32::fetch_sub(&mut slot, 3), 15);
            assert_eq!(u32::fetch_min(&mut slot, 4), 12);
            assert_eq!(u32::fetch_max(&mut slot, 100), 4);
            assert_eq!(u32::load_relaxed(&mut slot), 100);
        }
    }

    #[test]
    fn test_float_fetch_add() {
        let mut slot = 1.5f32;
        unsafe {
            assert_eq!(f32::fetch_add(&mut slot, 2.0), 1.5);
            assert_eq!(f32::load_relaxed(&mut slot), 3.5);
            assert_eq!(f32::fetch_sub(&mut slot, 0.5), 3.5);
            assert_eq!(f32::load_relaxed(&mut slot), 3.0);
        }
    }

    #[test]
    fn test_float_fetch_add_concurrent() {
        use std::sync::atomic::AtomicU32 as Cell;
        let cell = Cell::new(0.0f32.to_bits());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        unsafe {
                            f32::fetch_add(cell.as_ptr() as *mut f32, 1.0);
                        }
                    }
                });
            }
        });

        assert_eq!(f32::from_bits(cell.load(Ordering::Relaxed)), 8000.0);
    }
}
