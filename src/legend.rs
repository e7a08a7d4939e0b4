use crate::imagery::{Palette, NO_ACTIVITY_COLOR};

pub const LEGEND_TITLE: &str = "Net Photosynthesis";
pub const LEGEND_UNITS: &str = "(kgC/m²)";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegendEntry {
    pub label: String,
    pub color: [u8; 3],
}

/// Legend rows: "No Activity" first, then one row per palette bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn from_palette(palette: &Palette) -> Self {
        let mut entries = vec![LegendEntry {
            label: "No Activity".to_string(),
            color: NO_ACTIVITY_COLOR,
        }];
        entries.extend(palette.buckets().iter().map(|b| LegendEntry {
            label: b.label.clone(),
            color: b.color,
        }));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legend_follows_palette() {
        let legend = Legend::from_palette(&Palette::default());
        assert_eq!(legend.len(), 6);
        assert_eq!(legend.entries[0].label, "No Activity");
        assert_eq!(legend.entries[0].color, [255, 255, 255]);
        assert_eq!(legend.entries[1].label, "0.0005 - 0.024");
        assert_eq!(legend.entries[5].color, [0, 100, 0]);
    }
}
