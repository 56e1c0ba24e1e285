//! Store status snapshot parsed from an `INFO` reply

use serde::Serialize;
use std::collections::BTreeMap;

/// `field: value` pairs grouped by lower-cased section name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl StoreInfo {
    /// Parse the text format of a Redis `INFO` reply
    ///
    /// ```text
    /// # Server
    /// redis_version:7.2.4
    /// # Keyspace
    /// db0:keys=12,expires=12,avg_ttl=0
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current = String::from("default");

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('#') {
                current = name.trim().to_lowercase();
                sections.entry(current.clone()).or_default();
                continue;
            }
            if let Some((field, value)) = line.split_once(':') {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(field.trim().to_string(), value.trim().to_string());
            }
        }

        Self { sections }
    }

    /// Look up a single field, section names are case-insensitive
    pub fn get(&self, section: &str, field: &str) -> Option<&str> {
        self.sections
            .get(&section.to_lowercase())
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&section.to_lowercase())
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, String>)> {
        self.sections.iter().map(|(name, fields)| (name.as_str(), fields))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(BTreeMap::is_empty)
    }

    /// Key count of a logical database (`db0:keys=12,...`)
    pub fn keyspace_keys(&self, database: u8) -> Option<u64> {
        let entry = self.get("keyspace", &format!("db{database}"))?;
        entry
            .split(',')
            .find_map(|part| part.strip_prefix("keys="))
            .and_then(|n| n.parse().ok())
    }
}
