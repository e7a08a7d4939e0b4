use std::fmt;

use super::raster::NO_CLASS;

/// Legend color for pixels the service marks as having no data
pub const NO_ACTIVITY_COLOR: [u8; 3] = [255, 255, 255];

/// How a value equal to a bucket threshold is classified
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Boundary {
    /// First bucket whose threshold is strictly greater than the value
    #[default]
    Exclusive,
    /// First bucket whose threshold is greater than or equal to the value
    Inclusive,
}

/// Values below `threshold` (or up to it, with [`Boundary::Inclusive`]) map to `color`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBucket {
    pub threshold: u8,
    pub color: [u8; 3],
    pub label: String,
}

impl PixelBucket {
    pub fn new(threshold: u8, color: [u8; 3], label: impl Into<String>) -> Self {
        Self { threshold, color, label: label.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteError {
    Empty,
    /// Threshold at `index` is not above the previous one
    Unordered { index: usize },
    /// More buckets than a class grid can tell apart from no-data
    TooMany { count: usize },
}

impl fmt::Display for PaletteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaletteError::Empty => write!(f, "palette has no buckets"),
            PaletteError::Unordered { index } => {
                write!(f, "bucket {index} threshold does not increase")
            }
            PaletteError::TooMany { count } => {
                write!(f, "palette has {count} buckets; at most {MAX_BUCKETS} are supported")
            }
        }
    }
}

impl std::error::Error for PaletteError {}

/// Class indices must stay below the grid's no-data marker
pub const MAX_BUCKETS: usize = NO_CLASS as usize;

/// Ordered bucket table. The last bucket also covers everything above its threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    buckets: Vec<PixelBucket>,
    boundary: Boundary,
}

impl Palette {
    pub fn new(buckets: Vec<PixelBucket>, boundary: Boundary) -> Result<Self, PaletteError> {
        if buckets.is_empty() {
            return Err(PaletteError::Empty);
        }
        if buckets.len() > MAX_BUCKETS {
            return Err(PaletteError::TooMany { count: buckets.len() });
        }
        if let Some(index) = buckets
            .windows(2)
            .position(|w| w[1].threshold <= w[0].threshold)
        {
            return Err(PaletteError::Unordered { index: index + 1 });
        }
        Ok(Self { buckets, boundary })
    }

    /// Five productivity classes keyed on the green channel, net photosynthesis in kgC/m²
    pub fn net_photosynthesis(boundary: Boundary) -> Self {
        let buckets = vec![
            PixelBucket::new(51, [101, 67, 33], "0.0005 - 0.024"),
            PixelBucket::new(102, [230, 180, 100], "0.024 - 0.048"),
            PixelBucket::new(153, [200, 230, 100], "0.048 - 0.072"),
            PixelBucket::new(204, [100, 200, 100], "0.072 - 0.096"),
            PixelBucket::new(255, [0, 100, 0], "0.096 - 0.12"),
        ];
        Self { buckets, boundary }
    }

    pub fn buckets(&self) -> &[PixelBucket] {
        &self.buckets
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket index for a channel value
    #[inline(always)]
    pub fn lookup(&self, value: u8) -> usize {
        let found = match self.boundary {
            Boundary::Exclusive => self.buckets.iter().position(|b| b.threshold > value),
            Boundary::Inclusive => self.buckets.iter().position(|b| b.threshold >= value),
        };
        found.unwrap_or(self.buckets.len() - 1)
    }

    #[inline(always)]
    pub fn color_for(&self, value: u8) -> [u8; 3] {
        self.buckets[self.lookup(value)].color
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::net_photosynthesis(Boundary::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> Vec<PixelBucket> {
        vec![
            PixelBucket::new(10, [1, 1, 1], "low"),
            PixelBucket::new(20, [2, 2, 2], "mid"),
            PixelBucket::new(30, [3, 3, 3], "high"),
        ]
    }

    #[test]
    fn test_exclusive_lookup() {
        let palette = Palette::new(three(), Boundary::Exclusive).unwrap();
        assert_eq!(palette.lookup(0), 0);
        assert_eq!(palette.lookup(9), 0);
        assert_eq!(palette.lookup(10), 1);
        assert_eq!(palette.lookup(29), 2);
        // Above the last threshold still lands in the last bucket
        assert_eq!(palette.lookup(30), 2);
        assert_eq!(palette.lookup(255), 2);
    }

    #[test]
    fn test_inclusive_lookup() {
        let palette = Palette::new(three(), Boundary::Inclusive).unwrap();
        assert_eq!(palette.lookup(10), 0);
        assert_eq!(palette.lookup(11), 1);
        assert_eq!(palette.lookup(20), 1);
        assert_eq!(palette.lookup(30), 2);
        assert_eq!(palette.color_for(31), [3, 3, 3]);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert_eq!(Palette::new(vec![], Boundary::Exclusive), Err(PaletteError::Empty));
        let mut buckets = three();
        buckets[2].threshold = 20;
        assert_eq!(
            Palette::new(buckets, Boundary::Exclusive),
            Err(PaletteError::Unordered { index: 2 })
        );
    }

    #[test]
    fn test_rejects_class_colliding_with_no_data() {
        let every: Vec<_> = (0..=255u8).map(|t| PixelBucket::new(t, [t, t, t], "")).collect();
        assert_eq!(
            Palette::new(every.clone(), Boundary::Exclusive),
            Err(PaletteError::TooMany { count: 256 })
        );
        let fits = Palette::new(every[..MAX_BUCKETS].to_vec(), Boundary::Exclusive).unwrap();
        assert_eq!(fits.lookup(254), MAX_BUCKETS - 1);
        assert_ne!((fits.len() - 1) as u8, NO_CLASS);
    }

    #[test]
    fn test_default_palette_covers_channel() {
        let palette = Palette::default();
        assert_eq!(palette.len(), 5);
        assert_eq!(palette.color_for(0), [101, 67, 33]);
        assert_eq!(palette.color_for(51), [230, 180, 100]);
        assert_eq!(palette.color_for(255), [0, 100, 0]);
        let mut prev = 0;
        for v in 0..=255u8 {
            let idx = palette.lookup(v);
            assert!(idx >= prev);
            prev = idx;
        }
    }
}
