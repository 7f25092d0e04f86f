//! Brute-force search for uniformly partitioned overlap-save parameters
//!
//! Picks the partition length `L` and transform size `K` minimising an
//! operation-count model of one UPOLS block, normalised per output sample.
//! The model coefficients follow Wefers, "Partitioned convolution algorithms
//! for real-time auralization" (2015), p. 211, and must not be tuned: changing
//! them changes which parameters get selected.

use crate::utils::{floor_log2, gcd, next_power_of_two};
use crate::{AudioError, AudioResult};

/// Partition length and transform size chosen for a UPOLS convolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpolsParameters {
    /// Sub-filter length `L`
    pub partition_size: usize,
    /// Transform size `K` (the convolver's NFFT)
    pub fft_size: usize,
}

impl UpolsParameters {
    /// Parameters for a caller-chosen partition length
    ///
    /// The transform must fit one block, one partition and the largest
    /// remainder delay `B - gcd(L, B)` a partition can be shifted by.
    pub fn for_partition(partition_size: usize, block_size: usize) -> AudioResult<Self> {
        if block_size == 0 {
            return Err(AudioError::InvalidBlockSize);
        }
        if partition_size == 0 {
            return Err(AudioError::InvalidPartitionSize);
        }

        let max_delay = block_size - gcd(partition_size, block_size);
        Ok(Self {
            partition_size,
            fft_size: block_size + partition_size + max_delay,
        })
    }
}

/// Estimated cost per output sample of UPOLS with block size `B`, filter
/// length `N`, partition length `L` and transform size `K`
///
/// Forward and inverse transform, one spectral multiply for the first
/// partition and a multiply-add for each further one.
pub fn upols_cost(block_size: usize, ir_len: usize, partition_size: usize, fft_size: usize) -> f64 {
    let b = block_size as f64;
    let n = ir_len as f64;
    let l = partition_size as f64;
    let k = fft_size as f64;
    let k_log_k = k * log2(k);

    (1.0 / b)
        * (1.68 * k_log_k
            + 3.49 * k_log_k
            + 6.0 * ((k + 1.0) / 2.0)
            + ((n / l) - 1.0) * 8.0 * ((k + 1.0) / 2.0))
}

/// Search all power-of-two partition lengths below `ir_len` and every
/// feasible transform size for the cheapest UPOLS configuration
///
/// For each candidate `L` the smallest usable transform is
/// `Kmin = B + L + (B - gcd(L, B)) - 1`; every size up to the next power of
/// two is scored. Ties keep the first (smallest) candidate found.
///
/// # Errors
/// `InsufficientData` for an empty filter, `InvalidBlockSize` for `B == 0`.
///
/// # Example
///
/// ```rust
/// use blockconv::optimize::optimize_upols_parameters;
///
/// let params = optimize_upols_parameters(4096, 256).unwrap();
/// assert!(params.partition_size.is_power_of_two());
/// assert!(params.fft_size >= 256 + params.partition_size - 1);
/// ```
pub fn optimize_upols_parameters(ir_len: usize, block_size: usize) -> AudioResult<UpolsParameters> {
    if ir_len == 0 {
        return Err(AudioError::InsufficientData);
    }
    if block_size == 0 {
        return Err(AudioError::InvalidBlockSize);
    }

    let mut best: Option<(f64, UpolsParameters)> = None;

    let max_exponent = floor_log2(ir_len).max(1);
    for exponent in 0..max_exponent {
        let partition_size = 1usize << exponent;
        let max_delay = block_size - gcd(partition_size, block_size);
        let k_min = block_size + partition_size + max_delay - 1;
        let mut k_max = next_power_of_two(k_min);
        if k_max == k_min {
            k_max += 1;
        }

        for fft_size in k_min..=k_max {
            let cost = upols_cost(block_size, ir_len, partition_size, fft_size);
            if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                best = Some((
                    cost,
                    UpolsParameters {
                        partition_size,
                        fft_size,
                    },
                ));
            }
        }
    }

    let (cost, params) = best.ok_or(AudioError::InsufficientData)?;
    log::debug!(
        "UPOLS parameters for N={} B={}: L={} K={} (cost {:.2}/sample)",
        ir_len,
        block_size,
        params.partition_size,
        params.fft_size,
        cost
    );
    Ok(params)
}

#[cfg(feature = "std")]
fn log2(x: f64) -> f64 {
    x.log2()
}

#[cfg(not(feature = "std"))]
fn log2(x: f64) -> f64 {
    libm::log2(x)
}
