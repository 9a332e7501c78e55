//! Subject taxonomy lookup table
//!
//! Incidents are categorized by binding a `subject` record. The table maps a
//! readable label (the subject title with `\` and spaces turned into `_`) to
//! the subject id and the three search/category fields set alongside it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::ODataResponse;
use crate::api::ApiClient;
use crate::error::{CrmError, Result};

/// Subject row as listed by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubject {
    pub title: String,
    pub subjectid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub subjectid: String,
    pub coop_kasearchstring: String,
    pub coop_topparentcategory: String,
    pub coop_categoryautocomplete: String,
}

impl SubjectEntry {
    fn from_raw(raw: &RawSubject) -> Self {
        let top = raw.title.split('\\').next().unwrap_or_default();
        Self {
            subjectid: raw.subjectid.clone(),
            coop_kasearchstring: format!("*{}*", raw.title),
            coop_topparentcategory: top.to_string(),
            coop_categoryautocomplete: raw.title.clone(),
        }
    }

    /// Fields to merge into an incident PATCH body
    pub fn patch_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "subjectid@odata.bind".into(),
            Value::String(format!("/subjects({})", self.subjectid)),
        );
        fields.insert(
            "coop_kasearchstring".into(),
            Value::String(self.coop_kasearchstring.clone()),
        );
        fields.insert(
            "coop_topparentcategory".into(),
            Value::String(self.coop_topparentcategory.clone()),
        );
        fields.insert(
            "coop_categoryautocomplete".into(),
            Value::String(self.coop_categoryautocomplete.clone()),
        );
        fields
    }
}

/// Label for a subject title
pub fn subject_label(title: &str) -> String {
    title.replace('\\', "_").replace(' ', "_")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectTable {
    entries: BTreeMap<String, SubjectEntry>,
}

impl SubjectTable {
    /// Convert a raw listing; a later title with the same label wins
    pub fn from_subjects(subjects: &[RawSubject]) -> Self {
        let entries = subjects
            .iter()
            .map(|raw| (subject_label(&raw.title), SubjectEntry::from_raw(raw)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, label: &str) -> Option<&SubjectEntry> {
        self.entries.get(label)
    }

    pub fn resolve(&self, label: &str) -> Result<&SubjectEntry> {
        self.entries
            .get(label)
            .ok_or_else(|| CrmError::UnknownSubject(label.to_string()))
    }

    /// Load from disk; a missing file yields an empty table
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("No subjects file at {}, run 'subjects sync'", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| CrmError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CrmError::Storage {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| CrmError::Storage {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Download the subject listing, optionally narrowed by an OData `$filter`
pub async fn fetch_subjects(api: &ApiClient, filter: Option<&str>) -> Result<Vec<RawSubject>> {
    let mut params = vec![("$select".to_string(), "title,subjectid".to_string())];
    if let Some(filter) = filter {
        params.push(("$filter".to_string(), filter.to_string()));
    }

    let response = api.get("subjects", &params).await?.error_for_status()?;
    let listing: ODataResponse<RawSubject> = response.json_as()?;
    log::info!("Fetched {} subjects", listing.value.len());
    Ok(listing.value)
}

/// Download subjects and write the lookup table to `path`
pub async fn sync_subjects(api: &ApiClient, filter: Option<&str>, path: &Path) -> Result<SubjectTable> {
    let subjects = fetch_subjects(api, filter).await?;
    if subjects.is_empty() {
        return Err(CrmError::Query("No subjects found".into()));
    }

    let table = SubjectTable::from_subjects(&subjects);
    table.save(path)?;
    log::info!("Wrote {} subjects to {}", table.len(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(title: &str, id: &str) -> RawSubject {
        RawSubject {
            title: title.to_string(),
            subjectid: id.to_string(),
        }
    }

    #[test]
    fn test_conversion() {
        let table = SubjectTable::from_subjects(&[raw(
            "Medlemsservice\\Manuella medlemskap",
            "5a000000-0000-0000-0000-000000000001",
        )]);

        let entry = table.resolve("Medlemsservice_Manuella_medlemskap").unwrap();
        assert_eq!(entry.coop_kasearchstring, "*Medlemsservice\\Manuella medlemskap*");
        assert_eq!(entry.coop_topparentcategory, "Medlemsservice");
        assert_eq!(entry.coop_categoryautocomplete, "Medlemsservice\\Manuella medlemskap");
    }

    #[test]
    fn test_unknown_label() {
        let table = SubjectTable::default();
        assert!(matches!(
            table.resolve("Nope"),
            Err(CrmError::UnknownSubject(label)) if label == "Nope"
        ));
    }

    #[test]
    fn test_patch_fields() {
        let table = SubjectTable::from_subjects(&[raw("Billing", "abc")]);
        let fields = table.resolve("Billing").unwrap().patch_fields();
        assert_eq!(
            Value::Object(fields),
            json!({
                "subjectid@odata.bind": "/subjects(abc)",
                "coop_kasearchstring": "*Billing*",
                "coop_topparentcategory": "Billing",
                "coop_categoryautocomplete": "Billing"
            })
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");

        assert!(SubjectTable::load(&path).unwrap().is_empty());

        let table = SubjectTable::from_subjects(&[raw("A\\B", "1"), raw("C", "2")]);
        table.save(&path).unwrap();
        let loaded = SubjectTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.labels().collect::<Vec<_>>(), vec!["A_B", "C"]);
    }
}
