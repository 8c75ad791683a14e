use serde::{Deserialize, Serialize};

/// The single authoritative record for one source document.
///
/// Every field is always present in the persisted form; an empty string
/// means "not yet produced". This keeps the schema shape identical for
/// every record regardless of which producers have run so far, so a
/// partially-processed store diffs cleanly against a finished one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Stable identifier derived from the source document's base filename.
    /// Immutable once created; the unique key of the store.
    pub id: String,
    #[serde(default)]
    pub person_name: String,
    #[serde(default)]
    pub certificate_url: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub event_date: String,
    #[serde(default)]
    pub event_location: String,
    #[serde(default)]
    pub cause_of_death: String,
    #[serde(default)]
    pub classification: String,
}

impl CanonicalRecord {
    /// A freshly-seeded record: all fields empty, ready to be overwritten
    /// by whichever partial fields the triggering producer supplies.
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            person_name: String::new(),
            certificate_url: String::new(),
            raw_text: String::new(),
            event_date: String::new(),
            event_location: String::new(),
            cause_of_death: String::new(),
            classification: String::new(),
        }
    }
}

/// A batch element from one producer: only the fields that producer is
/// responsible for. `None` means "this producer did not touch the field"
/// and the canonical value is left alone during merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_of_death: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

impl PartialRecord {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    /// Build a partial record from a raw JSON object, optionally renaming a
    /// producer-specific identifying key (e.g. `"output filename"`) to `id`
    /// first. Unknown keys are ignored.
    pub fn from_value(
        mut value: serde_json::Value,
        source_key: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        if let (Some(key), Some(obj)) = (source_key, value.as_object_mut()) {
            if let Some(v) = obj.remove(key) {
                obj.insert("id".to_string(), v);
            }
        }
        serde_json::from_value(value)
    }

    /// Field-level overwrite: every present field replaces the canonical
    /// value, absent fields are left untouched. Last writer wins; there is
    /// no conflict detection. The `id` itself is never rewritten.
    pub fn apply_to(&self, record: &mut CanonicalRecord) {
        if let Some(v) = &self.person_name {
            record.person_name = v.clone();
        }
        if let Some(v) = &self.certificate_url {
            record.certificate_url = v.clone();
        }
        if let Some(v) = &self.raw_text {
            record.raw_text = v.clone();
        }
        if let Some(v) = &self.event_date {
            record.event_date = v.clone();
        }
        if let Some(v) = &self.event_location {
            record.event_location = v.clone();
        }
        if let Some(v) = &self.cause_of_death {
            record.cause_of_death = v.clone();
        }
        if let Some(v) = &self.classification {
            record.classification = v.clone();
        }
    }
}

/// Categorical label derived from a cause-of-death string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Positive,
    Negative,
    Unknown,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}
