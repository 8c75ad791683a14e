//! The record-producing stages between download and reconciliation.
//!
//! Each producer ([`ManifestStage`], [`NameStage`], [`FieldsStage`],
//! [`ClassifyStage`]) implements [`DocumentProducer`]; the OCR stage
//! lives in [`super::ocr`] next to its service client. The manifest
//! stage re-merges its whole batch every run; the others key pending
//! units off which canonical fields are still empty, which is what
//! makes every stage resumable without an external log.

use super::error::StageError;
use super::ollama::{parse_object_response, string_field, LlmClient};
use super::prompts;
use super::traits::{DocumentProducer, StageUnit};
use crate::classify::classify_cause;
use crate::models::{CanonicalRecord, PartialRecord};
use crate::store::RecordMap;

/// Ingests the batch a scraper variant collected (downloader manifest):
/// certificate ids and their source URLs.
pub struct ManifestStage {
    partials: Vec<PartialRecord>,
}

impl ManifestStage {
    pub fn new(partials: Vec<PartialRecord>) -> Self {
        Self { partials }
    }
}

impl DocumentProducer for ManifestStage {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn pending(&self, _records: &RecordMap) -> Result<Vec<StageUnit>, StageError> {
        // Every batch entry, every run. The merge is idempotent, and a
        // re-scraped batch may carry a corrected URL for a known id.
        let units = self
            .partials
            .iter()
            .filter_map(|p| p.id.as_deref())
            .filter(|id| !id.is_empty())
            .map(StageUnit::for_id)
            .collect();
        Ok(units)
    }

    fn produce(&self, unit: &StageUnit, _records: &RecordMap) -> Result<PartialRecord, StageError> {
        self.partials
            .iter()
            .find(|p| p.id.as_deref() == Some(unit.id.as_str()))
            .cloned()
            .ok_or_else(|| StageError::MissingRecord(unit.id.clone()))
    }
}

fn lookup<'a>(records: &'a RecordMap, id: &str) -> Result<&'a CanonicalRecord, StageError> {
    records
        .get(id)
        .ok_or_else(|| StageError::MissingRecord(id.to_string()))
}

/// Ids with transcribed text the given field set has not been extracted
/// for yet, in store order.
fn ids_with_text<F>(records: &RecordMap, not_done: F) -> Vec<StageUnit>
where
    F: Fn(&CanonicalRecord) -> bool,
{
    records
        .values()
        .filter(|r| !r.raw_text.is_empty() && not_done(r))
        .map(|r| StageUnit::for_id(&r.id))
        .collect()
}

/// Extracts the deceased's full name from raw OCR text via the LLM.
pub struct NameStage<'a> {
    llm: &'a dyn LlmClient,
    model: String,
}

impl<'a> NameStage<'a> {
    pub fn new(llm: &'a dyn LlmClient, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }
}

impl DocumentProducer for NameStage<'_> {
    fn name(&self) -> &'static str {
        "names"
    }

    fn pending(&self, records: &RecordMap) -> Result<Vec<StageUnit>, StageError> {
        Ok(ids_with_text(records, |r| r.person_name.is_empty()))
    }

    fn produce(&self, unit: &StageUnit, records: &RecordMap) -> Result<PartialRecord, StageError> {
        let record = lookup(records, &unit.id)?;
        let prompt = prompts::build_name_prompt(&record.raw_text);
        let raw = self
            .llm
            .generate_structured(&self.model, &prompt, &prompts::name_schema())?;
        let obj = parse_object_response(&raw)?;

        Ok(PartialRecord {
            person_name: Some(string_field(&obj, "person_name")),
            ..PartialRecord::with_id(&unit.id)
        })
    }
}

/// Extracts event date, event location and cause of death via the LLM.
pub struct FieldsStage<'a> {
    llm: &'a dyn LlmClient,
    model: String,
    start_year: i32,
    end_year: i32,
}

impl<'a> FieldsStage<'a> {
    pub fn new(llm: &'a dyn LlmClient, model: &str, start_year: i32, end_year: i32) -> Self {
        Self {
            llm,
            model: model.to_string(),
            start_year,
            end_year,
        }
    }
}

impl DocumentProducer for FieldsStage<'_> {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn pending(&self, records: &RecordMap) -> Result<Vec<StageUnit>, StageError> {
        Ok(ids_with_text(records, |r| {
            r.event_date.is_empty() && r.event_location.is_empty() && r.cause_of_death.is_empty()
        }))
    }

    fn produce(&self, unit: &StageUnit, records: &RecordMap) -> Result<PartialRecord, StageError> {
        let record = lookup(records, &unit.id)?;
        let prompt =
            prompts::build_fields_prompt(&record.raw_text, self.start_year, self.end_year);
        let raw =
            self.llm
                .generate_structured(&self.model, &prompt, &prompts::fields_schema())?;
        let obj = parse_object_response(&raw)?;

        Ok(PartialRecord {
            event_date: Some(string_field(&obj, "event_date")),
            event_location: Some(string_field(&obj, "event_location")),
            cause_of_death: Some(string_field(&obj, "cause_of_death")),
            ..PartialRecord::with_id(&unit.id)
        })
    }
}

/// Derives the classification label from the stored cause of death.
/// Purely local, no service call.
pub struct ClassifyStage;

impl DocumentProducer for ClassifyStage {
    fn name(&self) -> &'static str {
        "classify"
    }

    fn pending(&self, records: &RecordMap) -> Result<Vec<StageUnit>, StageError> {
        // Only records the fields stage has produced output for. Labeling
        // earlier would read an empty cause, record "unknown", and never
        // revisit the record once the real cause arrives.
        Ok(ids_with_text(records, |r| {
            r.classification.is_empty()
                && !(r.event_date.is_empty()
                    && r.event_location.is_empty()
                    && r.cause_of_death.is_empty())
        }))
    }

    fn produce(&self, unit: &StageUnit, records: &RecordMap) -> Result<PartialRecord, StageError> {
        let record = lookup(records, &unit.id)?;
        let label = classify_cause(&record.cause_of_death);
        tracing::debug!(id = %unit.id, label = label.as_str(), "Classified cause of death");

        Ok(PartialRecord {
            classification: Some(label.as_str().to_string()),
            ..PartialRecord::with_id(&unit.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::upsert_merge;

    /// LLM double returning a canned response.
    pub struct FixedLlm(pub &'static str);

    impl LlmClient for FixedLlm {
        fn generate_structured(
            &self,
            _model: &str,
            _prompt: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, StageError> {
            Ok(self.0.to_string())
        }
    }

    fn record_with_text(id: &str, text: &str) -> CanonicalRecord {
        let mut record = CanonicalRecord::empty(id);
        record.raw_text = text.to_string();
        record
    }

    fn map_of(records: Vec<CanonicalRecord>) -> RecordMap {
        records.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    #[test]
    fn manifest_pends_every_batch_entry() {
        let stage = ManifestStage::new(vec![
            PartialRecord {
                certificate_url: Some("https://example.org/a".to_string()),
                ..PartialRecord::with_id("a")
            },
            PartialRecord {
                certificate_url: Some("https://example.org/b".to_string()),
                ..PartialRecord::with_id("b")
            },
        ]);

        let mut known = CanonicalRecord::empty("a");
        known.certificate_url = "https://example.org/a".to_string();
        let records = map_of(vec![known]);

        let units = stage.pending(&records).unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn manifest_reingest_overrides_stale_url() {
        let stage = ManifestStage::new(vec![PartialRecord {
            certificate_url: Some("https://example.org/a-corrected".to_string()),
            ..PartialRecord::with_id("a")
        }]);

        let mut known = CanonicalRecord::empty("a");
        known.certificate_url = "https://example.org/a-moved".to_string();
        let mut records = map_of(vec![known]);

        let units = stage.pending(&records).unwrap();
        assert_eq!(units.len(), 1);
        let partial = stage.produce(&units[0], &records).unwrap();
        upsert_merge(&mut records, &[partial]);

        assert_eq!(
            records["a"].certificate_url,
            "https://example.org/a-corrected"
        );
    }

    #[test]
    fn manifest_produce_returns_the_batch_element() {
        let stage = ManifestStage::new(vec![PartialRecord {
            certificate_url: Some("https://example.org/a".to_string()),
            ..PartialRecord::with_id("a")
        }]);
        let partial = stage
            .produce(&StageUnit::for_id("a"), &RecordMap::new())
            .unwrap();
        assert_eq!(
            partial.certificate_url.as_deref(),
            Some("https://example.org/a")
        );
    }

    #[test]
    fn name_stage_extracts_person_name() {
        let llm = FixedLlm(r#"[{"person_name": "Mary Smith"}]"#);
        let stage = NameStage::new(&llm, "deepseek-r1:32b");
        let records = map_of(vec![record_with_text("a", "certificate text")]);

        let units = stage.pending(&records).unwrap();
        assert_eq!(units.len(), 1);

        let partial = stage.produce(&units[0], &records).unwrap();
        assert_eq!(partial.person_name.as_deref(), Some("Mary Smith"));
        assert!(partial.cause_of_death.is_none());
    }

    #[test]
    fn name_stage_skips_records_without_text_or_already_named() {
        let llm = FixedLlm("[]");
        let stage = NameStage::new(&llm, "deepseek-r1:32b");

        let mut named = record_with_text("a", "text");
        named.person_name = "Known".to_string();
        let records = map_of(vec![named, CanonicalRecord::empty("b")]);

        assert!(stage.pending(&records).unwrap().is_empty());
    }

    #[test]
    fn fields_stage_extracts_three_fields() {
        let llm = FixedLlm(
            r#"[{"event_date": "July 4, 1866", "event_location": "Mulberry St", "cause_of_death": "cholera"}]"#,
        );
        let stage = FieldsStage::new(&llm, "deepseek-r1:32b", 1865, 1867);
        let records = map_of(vec![record_with_text("a", "certificate text")]);

        let partial = stage.produce(&StageUnit::for_id("a"), &records).unwrap();
        assert_eq!(partial.event_date.as_deref(), Some("July 4, 1866"));
        assert_eq!(partial.event_location.as_deref(), Some("Mulberry St"));
        assert_eq!(partial.cause_of_death.as_deref(), Some("cholera"));
    }

    #[test]
    fn fields_stage_malformed_response_is_an_error() {
        let llm = FixedLlm("not json at all");
        let stage = FieldsStage::new(&llm, "deepseek-r1:32b", 1865, 1867);
        let records = map_of(vec![record_with_text("a", "text")]);

        assert!(matches!(
            stage.produce(&StageUnit::for_id("a"), &records),
            Err(StageError::ResponseParsing(_))
        ));
    }

    #[test]
    fn classify_stage_labels_from_cause() {
        let mut record = record_with_text("a", "text");
        record.cause_of_death = "asiatic cholera".to_string();
        let records = map_of(vec![record]);

        let partial = ClassifyStage
            .produce(&StageUnit::for_id("a"), &records)
            .unwrap();
        assert_eq!(partial.classification.as_deref(), Some("positive"));
    }

    #[test]
    fn classify_stage_waits_for_extracted_fields() {
        // transcribed but not yet through field extraction: nothing to label
        let records = map_of(vec![record_with_text("a", "text")]);
        assert!(ClassifyStage.pending(&records).unwrap().is_empty());

        // a blank cause next to a real date still counts as extracted
        let mut extracted = record_with_text("a", "text");
        extracted.event_date = "July 4, 1866".to_string();
        let records = map_of(vec![extracted]);

        let units = ClassifyStage.pending(&records).unwrap();
        assert_eq!(units.len(), 1);
        let partial = ClassifyStage.produce(&units[0], &records).unwrap();
        assert_eq!(partial.classification.as_deref(), Some("unknown"));

        // once merged, the record no longer pends
        let mut labeled = record_with_text("a", "text");
        labeled.event_date = "July 4, 1866".to_string();
        labeled.classification = "unknown".to_string();
        let records = map_of(vec![labeled]);
        assert!(ClassifyStage.pending(&records).unwrap().is_empty());
    }

    #[test]
    fn classify_stage_picks_up_late_field_extraction() {
        let mut records = RecordMap::new();
        upsert_merge(
            &mut records,
            &[PartialRecord {
                raw_text: Some("certificate text".to_string()),
                ..PartialRecord::with_id("a")
            }],
        );

        // field extraction failed this run: no premature "unknown" label
        assert!(ClassifyStage.pending(&records).unwrap().is_empty());

        // next run the fields stage succeeds, and the label follows the cause
        upsert_merge(
            &mut records,
            &[PartialRecord {
                event_date: Some("July 4, 1866".to_string()),
                event_location: Some("Mulberry St".to_string()),
                cause_of_death: Some("asiatic cholera".to_string()),
                ..PartialRecord::with_id("a")
            }],
        );

        let units = ClassifyStage.pending(&records).unwrap();
        assert_eq!(units.len(), 1);
        let partial = ClassifyStage.produce(&units[0], &records).unwrap();
        upsert_merge(&mut records, &[partial]);

        assert_eq!(records["a"].classification, "positive");
    }

    #[test]
    fn missing_record_is_reported() {
        let llm = FixedLlm("[]");
        let stage = NameStage::new(&llm, "deepseek-r1:32b");
        assert!(matches!(
            stage.produce(&StageUnit::for_id("ghost"), &RecordMap::new()),
            Err(StageError::MissingRecord(_))
        ));
    }
}
