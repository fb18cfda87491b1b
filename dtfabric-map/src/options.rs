// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{MapError, MapErrorKind};

const DEFAULT_MAX_DEPTH: u32 = 64;

/// Options parameterizing [`crate::DataTypeMap::map_byte_stream`] (§2.3 of
/// `SPEC_FULL.md`).
#[derive(Debug, Clone)]
pub struct DecodingOptions {
    /// Recursion depth gauge used to bound nested structures/sequences.
    pub depth_gauge: DepthGauge,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            depth_gauge: DepthGauge::new(DEFAULT_MAX_DEPTH),
        }
    }
}

impl DecodingOptions {
    /// Options with an explicit maximum recursion depth.
    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            depth_gauge: DepthGauge::new(max_depth),
        }
    }
}

/// Tracks the current recursive descent depth during one decode, so nested
/// structures/sequences cannot overflow the native stack on a maliciously or
/// accidentally cyclic-looking byte stream.
#[derive(Debug)]
pub struct DepthGauge {
    max_depth: u32,
    current_depth: AtomicU32,
}

impl Clone for DepthGauge {
    fn clone(&self) -> Self {
        Self {
            max_depth: self.max_depth,
            current_depth: AtomicU32::new(0),
        }
    }
}

impl DepthGauge {
    /// Creates a gauge bounded at `max_depth`.
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            current_depth: AtomicU32::new(0),
        }
    }
}

/// An RAII guard obtained on entry to a recursive decode step, released on
/// drop. Construction fails once `max_depth` would be exceeded.
pub struct DepthLock<'a> {
    gauge: &'a DepthGauge,
}

impl Drop for DepthLock<'_> {
    fn drop(&mut self) {
        self.gauge.current_depth.fetch_sub(1, Ordering::Release);
    }
}

impl<'a> DepthLock<'a> {
    /// Increments the gauge and returns a guard, or
    /// [`MapErrorKind::RecursionLimitExceeded`] if the new depth exceeds the
    /// gauge's bound.
    pub fn obtain(gauge: &'a DepthGauge) -> Result<Self, MapError> {
        let max_depth = gauge.max_depth;
        let lock = Self { gauge };
        let previous = gauge.current_depth.fetch_add(1, Ordering::Acquire);
        if previous >= max_depth {
            // `lock` drops here, releasing the increment just taken.
            return Err(MapError::new(MapErrorKind::RecursionLimitExceeded(max_depth)));
        }
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_gauge_releases_on_drop() {
        let gauge = DepthGauge::new(1);
        {
            let _lock = DepthLock::obtain(&gauge).unwrap();
            assert!(DepthLock::obtain(&gauge).is_err());
        }
        assert!(DepthLock::obtain(&gauge).is_ok());
    }
}
