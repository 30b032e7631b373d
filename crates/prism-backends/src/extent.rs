//! Index-space extents for kernel launches
//!
//! An `Extent` describes the size of a 1-, 2- or 3-dimensional index space:
//! the global space of a launch, the local (work-group) partition of it, or
//! derived geometry such as the number of groups along each dimension.

use std::fmt;

use crate::error::{BackendError, Result};

/// Maximum number of index-space dimensions
pub const MAX_RANK: usize = 3;

/// A 1-, 2- or 3-dimensional index-space extent
///
/// Dimensions beyond the rank read as 1, so geometry arithmetic never needs
/// to special-case the rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    dims: [usize; MAX_RANK],
    rank: usize,
}

impl Extent {
    /// Create a 1D extent
    pub const fn d1(x: usize) -> Self {
        Self { dims: [x, 1, 1], rank: 1 }
    }

    /// Create a 2D extent
    pub const fn d2(x: usize, y: usize) -> Self {
        Self { dims: [x, y, 1], rank: 2 }
    }

    /// Create a 3D extent
    pub const fn d3(x: usize, y: usize, z: usize) -> Self {
        Self { dims: [x, y, z], rank: 3 }
    }

    /// Create an extent from a slice of dimensions
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the slice is empty or longer than
    /// [`MAX_RANK`].
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(BackendError::execution_error(format!(
                "extent rank must be 1..={}, got {}",
                MAX_RANK,
                dims.len()
            )));
        }
        let mut out = [1usize; MAX_RANK];
        out[..dims.len()].copy_from_slice(dims);
        Ok(Self {
            dims: out,
            rank: dims.len(),
        })
    }

    /// An extent of the given rank with every dimension set to 1
    pub const fn ones(rank: usize) -> Self {
        Self { dims: [1, 1, 1], rank }
    }

    /// Number of dimensions
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Size along dimension `d` (1 for dimensions beyond the rank)
    pub const fn dim(&self, d: usize) -> usize {
        if d < MAX_RANK {
            self.dims[d]
        } else {
            1
        }
    }

    /// Total number of index points
    pub const fn total(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Validate that every dimension within the rank is nonzero
    pub fn validate_nonzero(&self) -> Result<()> {
        for d in 0..self.rank {
            if self.dims[d] == 0 {
                return Err(BackendError::ZeroExtent { dim: d });
            }
        }
        Ok(())
    }

    /// Element-wise quotient `self / divisor`
    ///
    /// # Errors
    ///
    /// `RankMismatch` if the ranks differ; `IndivisibleExtent` naming the
    /// first dimension where `divisor` does not evenly divide `self`.
    pub fn checked_div(&self, divisor: &Extent) -> Result<Extent> {
        if self.rank != divisor.rank {
            return Err(BackendError::RankMismatch {
                global: self.rank,
                local: divisor.rank,
            });
        }
        let mut out = [1usize; MAX_RANK];
        for d in 0..self.rank {
            let (g, l) = (self.dims[d], divisor.dims[d]);
            if l == 0 || g % l != 0 {
                return Err(BackendError::IndivisibleExtent {
                    dim: d,
                    global: g,
                    local: l,
                });
            }
            out[d] = g / l;
        }
        Ok(Extent {
            dims: out,
            rank: self.rank,
        })
    }

    /// Convert a linear index into per-dimension coordinates (x fastest)
    pub fn delinearize(&self, linear: usize) -> [usize; MAX_RANK] {
        let x = linear % self.dims[0];
        let y = (linear / self.dims[0]) % self.dims[1];
        let z = linear / (self.dims[0] * self.dims[1]);
        [x, y, z]
    }
}

impl From<usize> for Extent {
    fn from(x: usize) -> Self {
        Extent::d1(x)
    }
}

impl From<(usize, usize)> for Extent {
    fn from((x, y): (usize, usize)) -> Self {
        Extent::d2(x, y)
    }
}

impl From<(usize, usize, usize)> for Extent {
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Extent::d3(x, y, z)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for d in 0..self.rank {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.dims[d])?;
        }
        write!(f, ")")
    }
}
