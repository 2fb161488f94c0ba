//! # Resolution Scaling
//!
//! Every geometric constant used by the matcher was tuned on report photos
//! resized to a canonical height. `ScaleManager` captures the ratio between
//! the working height of the current image and that canonical height.

use crate::errors::{InBodyError, InBodyResult};

/// Canonical image height (pixels) at which all geometric constants were tuned.
pub const CANONICAL_HEIGHT: u32 = 2400;

/// Dimensionless ratio between the working resolution and the canonical one.
///
/// # Examples
///
/// ```
/// use inbody_extract::scale::ScaleManager;
///
/// let manager = ScaleManager::canonical(1200).unwrap();
/// assert_eq!(manager.scale_ratio(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleManager {
    target_height: u32,
    base_height: u32,
    scale_ratio: f64,
}

impl ScaleManager {
    /// Create a manager for `target_height` relative to `base_height`.
    ///
    /// # Errors
    ///
    /// Returns `InBodyError::Configuration` when either height is not strictly
    /// positive or does not fit in a `u32`.
    pub fn new(target_height: i64, base_height: i64) -> InBodyResult<Self> {
        let target = positive_height("target_height", target_height)?;
        let base = positive_height("base_height", base_height)?;

        Ok(Self {
            target_height: target,
            base_height: base,
            scale_ratio: f64::from(target) / f64::from(base),
        })
    }

    /// Create a manager relative to [`CANONICAL_HEIGHT`].
    pub fn canonical(target_height: i64) -> InBodyResult<Self> {
        Self::new(target_height, i64::from(CANONICAL_HEIGHT))
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    pub fn base_height(&self) -> u32 {
        self.base_height
    }

    /// `target_height / base_height`, always strictly positive.
    pub fn scale_ratio(&self) -> f64 {
        self.scale_ratio
    }

    /// Scale a canonical pixel value, rounding toward negative infinity.
    pub fn scale_floor(&self, value: i32) -> i32 {
        (f64::from(value) * self.scale_ratio).floor() as i32
    }
}

fn positive_height(name: &str, value: i64) -> InBodyResult<u32> {
    if value <= 0 {
        return Err(InBodyError::Configuration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    u32::try_from(value).map_err(|_| {
        InBodyError::Configuration(format!("{} is too large: {}", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ratio_is_one() {
        let manager = ScaleManager::canonical(2400).unwrap();
        assert_eq!(manager.scale_ratio(), 1.0);
        assert_eq!(manager.base_height(), CANONICAL_HEIGHT);
    }

    #[test]
    fn test_rejects_non_positive_heights() {
        assert!(matches!(
            ScaleManager::new(0, 2400),
            Err(InBodyError::Configuration(_))
        ));
        assert!(matches!(
            ScaleManager::new(1200, -1),
            Err(InBodyError::Configuration(_))
        ));
        assert!(matches!(
            ScaleManager::new(i64::from(u32::MAX) + 1, 2400),
            Err(InBodyError::Configuration(_))
        ));
    }

    #[test]
    fn test_scale_floor() {
        let manager = ScaleManager::canonical(960).unwrap();
        assert_eq!(manager.scale_floor(50), 20);
        assert_eq!(manager.scale_floor(100), 40);
        assert_eq!(manager.scale_floor(10), 4);
    }
}
