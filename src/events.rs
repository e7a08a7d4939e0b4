//! Notable historical events shown next to the map for the selected year.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HistoricalEvent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

impl HistoricalEvent {
    fn new(title: &str, description: &str, icon: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Events keyed by year
#[derive(Clone, Debug, Default)]
pub struct EventCatalog {
    by_year: BTreeMap<i32, Vec<HistoricalEvent>>,
}

impl EventCatalog {
    /// Amazon-related events 2005-2024
    pub fn builtin() -> Self {
        let table = [
            (2005, "Amazon Drought", "Severe drought affected the Amazon basin", "🌵"),
            (2007, "Deforestation Peak", "High rates of Amazon deforestation recorded", "🪓"),
            (2010, "Major Drought", "Second major drought in 5 years", "☀️"),
            (2012, "Forest Code Reform", "Brazil Forest Code is significantly reformed", "📜"),
            (2015, "El Niño", "Strong El Niño event caused drought conditions", "🌊"),
            (2016, "Paris Agreement", "Climate agreement entered into force", "🌍"),
            (2019, "Amazon Wildfires", "Numerous fires in the Amazon", "🔥"),
            (2020, "COVID-19 Pandemic", "Global pandemic, reduced human activity", "🦠"),
            (2021, "Drought Returns", "Severe drought in parts of Brazil", "🌵"),
            (2023, "Record Temperatures", "Record temperatures recorded in the Amazon", "🌡️"),
            (2024, "Forest Fires", "Most devastating forest fire season in over 2 decades", "🔥"),
        ];

        let mut by_year: BTreeMap<i32, Vec<HistoricalEvent>> = BTreeMap::new();
        for (year, title, description, icon) in table {
            by_year.entry(year).or_default().push(HistoricalEvent::new(title, description, icon));
        }
        Self { by_year }
    }

    /// Load a `{"2005": [{"title": ..., "description": ..., "icon": ...}], ...}` file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let raw: HashMap<String, Vec<HistoricalEvent>> = simd_json::serde::from_slice(&mut bytes)
            .with_context(|| format!("parsing {}", path.display()))?;

        let mut by_year = BTreeMap::new();
        for (key, events) in raw {
            let year: i32 = key
                .trim()
                .parse()
                .with_context(|| format!("{key:?} is not a year"))?;
            by_year.insert(year, events);
        }
        Ok(Self { by_year })
    }

    pub fn for_year(&self, year: i32) -> &[HistoricalEvent] {
        self.by_year.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = EventCatalog::builtin();
        assert_eq!(catalog.for_year(2019)[0].title, "Amazon Wildfires");
        assert!(catalog.for_year(2006).is_empty());
        assert_eq!(catalog.for_year(2024)[0].title, "Forest Fires");
        assert!(catalog.for_year(2004).is_empty());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            r#"{"2008": [{"title": "Fund", "description": "Amazon Fund created"}],
                "2022": [{"title": "A", "description": "a", "icon": "x"}, {"title": "B", "description": "b"}]}"#,
        )
        .unwrap();

        let catalog = EventCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.for_year(2008)[0].description, "Amazon Fund created");
        assert_eq!(catalog.for_year(2008)[0].icon, "");
        assert_eq!(catalog.for_year(2022).len(), 2);
    }

    #[test]
    fn test_from_json_file_rejects_bad_year() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(&path, r#"{"soon": []}"#).unwrap();
        assert!(EventCatalog::from_json_file(&path).is_err());
    }
}
