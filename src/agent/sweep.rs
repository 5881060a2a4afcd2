//! OSINT sweep and SITREP generation.
//!
//! A sweep asks the model for a refreshed indicator matrix. A JSON answer of
//! the snapshot shape becomes a [`SnapshotPatch`]; anything else is kept as
//! an opaque report string.

use crate::agent::gemini::{Content, GeminiClient, GenerateRequest};
use crate::analysis::{Snapshot, SnapshotPatch};
use anyhow::{bail, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// What a sweep produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Indicator values to merge into the live snapshot.
    Indicators(SnapshotPatch),
    /// Free text that did not match the snapshot shape.
    Report(String),
}

/// Fallback when the SITREP model answers with nothing.
pub const EMPTY_SITREP: &str = "Unable to generate report.";
/// Fallback when the SITREP call fails.
pub const FAILED_SITREP: &str = "Communication failure with SITREP engine.";

/// Build the sweep request. The snapshot is embedded as the shape to return.
pub fn sweep_request(snapshot: &Snapshot, temperature: f64) -> GenerateRequest {
    let system = format!(
        "{} Return JSON matching structure: {}. 0-100 scale.",
        SWEEP_SYSTEM_PROMPT,
        snapshot.to_json()
    );

    GenerateRequest {
        contents: vec![Content::user(SWEEP_USER_PROMPT)],
        system_instruction: Some(Content::system(system)),
        tools: vec![json!({ "google_search": {} })],
        generation_config: Some(json!({ "responseMimeType": "application/json" })),
    }
    .with_temperature(temperature)
}

/// Run one sweep against the model.
pub async fn run_sweep(client: &GeminiClient, snapshot: &Snapshot) -> Result<AnalysisOutcome> {
    info!("Starting OSINT sweep");
    let request = sweep_request(snapshot, client.config().temperature);
    let response = client.generate(&request).await?;

    let Some(text) = response.text() else {
        bail!("Sweep returned no content");
    };

    let outcome = parse_sweep_text(text);
    match &outcome {
        AnalysisOutcome::Indicators(patch) => info!(
            "Sweep returned {} indicator values ({} ignored)",
            patch.entries().len(),
            patch.ignored()
        ),
        AnalysisOutcome::Report(_) => warn!("Sweep returned free text instead of a matrix"),
    }
    Ok(outcome)
}

/// Classify a sweep answer.
pub fn parse_sweep_text(text: &str) -> AnalysisOutcome {
    if let Some(doc) = extract_json_object(text) {
        let patch = SnapshotPatch::from_json(&doc);
        if !patch.is_empty() {
            return AnalysisOutcome::Indicators(patch);
        }
        debug!("JSON answer carried no known indicators");
    }
    AnalysisOutcome::Report(text.to_string())
}

/// Find a JSON object in a model answer, tolerating code fences and prose.
fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Build the SITREP prompt for the current matrix.
pub fn sitrep_prompt(snapshot: &Snapshot, score: u8, language: &str) -> String {
    format!(
        "Based on these indicators: {}, with a computed escalation probability of {}%, \
         write a professional strategic SITREP in {}.\n\
         Focus on escalation probability for the next 24h. Be concise and use military-grade tone.",
        snapshot.to_json(),
        score,
        language
    )
}

/// Build the SITREP request.
pub fn sitrep_request(
    snapshot: &Snapshot,
    score: u8,
    language: &str,
    temperature: f64,
) -> GenerateRequest {
    GenerateRequest::prompt(sitrep_prompt(snapshot, score, language)).with_temperature(temperature)
}

/// Ask the model for a SITREP. Empty answers become [`EMPTY_SITREP`].
pub async fn generate_sitrep(
    client: &GeminiClient,
    snapshot: &Snapshot,
    score: u8,
    language: &str,
) -> Result<String> {
    info!("Generating SITREP in {}", language);
    let request = sitrep_request(snapshot, score, language, client.config().temperature);
    let response = client.generate(&request).await?;

    Ok(response
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(EMPTY_SITREP)
        .to_string())
}

const SWEEP_SYSTEM_PROMPT: &str =
    "Strategic Intelligence Engine. \
     Analyze Iran-Israel tensions using current open-source reporting.";

const SWEEP_USER_PROMPT: &str = "Perform a live OSINT sweep based on today's strategic events.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::gemini::GenerateResponse;
    use crate::models::Indicator;

    #[test]
    fn test_sweep_request_embeds_shape() {
        let request = sweep_request(&Snapshot::baseline(), 0.5);
        let value = serde_json::to_value(&request).unwrap();

        let system = value["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.contains("\"ussGeorgia\":60.0"));
        assert!(system.contains("0-100 scale"));
        assert_eq!(value["tools"][0], json!({ "google_search": {} }));
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_parse_fenced_fixture() {
        let response: GenerateResponse =
            serde_json::from_str(include_str!("../../fixtures/sweep_response.json")).unwrap();

        match parse_sweep_text(response.text().unwrap()) {
            AnalysisOutcome::Indicators(patch) => {
                assert_eq!(patch.entries().len(), Indicator::COUNT);
                assert_eq!(patch.ignored(), 1);
                assert!(patch.entries().contains(&(Indicator::GpsJamming, 81.0)));
            }
            other => panic!("expected indicators, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let outcome = parse_sweep_text(r#"{"cyber": {"gpsJamming": 90}}"#);
        assert_eq!(
            outcome,
            AnalysisOutcome::Indicators(SnapshotPatch::default().with(Indicator::GpsJamming, 90.0))
        );
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let text = "Here is the matrix:\n{\"military\": {\"bomberDeploy\": 66}}\nStay safe.";
        match parse_sweep_text(text) {
            AnalysisOutcome::Indicators(patch) => {
                assert_eq!(patch.entries(), &[(Indicator::BomberDeploy, 66.0)]);
            }
            other => panic!("expected indicators, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_free_text_kept_verbatim() {
        let text = "Situation unchanged; no new reporting.";
        assert_eq!(parse_sweep_text(text), AnalysisOutcome::Report(text.to_string()));
    }

    #[test]
    fn test_parse_unrelated_json_is_report() {
        let text = r#"{"status": "ok"}"#;
        assert_eq!(parse_sweep_text(text), AnalysisOutcome::Report(text.to_string()));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{}"), "{}");
    }

    #[test]
    fn test_sitrep_request_carries_temperature() {
        let request = sitrep_request(&Snapshot::baseline(), 39, "English", 0.25);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["generationConfig"], json!({ "temperature": 0.25 }));
        assert!(value.get("systemInstruction").is_none());
        let prompt = value["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("in English"));
    }

    #[test]
    fn test_sitrep_prompt() {
        let prompt = sitrep_prompt(&Snapshot::baseline(), 39, "Hebrew");
        assert!(prompt.contains("39%"));
        assert!(prompt.contains("in Hebrew"));
        assert!(prompt.contains("\"gpsJamming\":70.0"));
    }
}
