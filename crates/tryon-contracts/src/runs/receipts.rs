use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// What went into one try-on cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryOnRequest {
    pub person_digest: String,
    pub garment_digest: String,
    pub garment_source: String,
    pub pose: String,
    pub instructions: String,
    pub text_model: String,
    pub image_model: String,
}

/// One backend exchange, as recorded in a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub purpose: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub backend_response: Map<String, Value>,
    pub error: Option<String>,
}

pub fn build_receipt(
    request: &TryOnRequest,
    calls: &[CallRecord],
    image_path: &Path,
    receipt_path: &Path,
    result_metadata: &Map<String, Value>,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "request".to_string(),
        sanitize_payload(&serde_json::to_value(request).unwrap_or(Value::Null)),
    );
    root.insert(
        "calls".to_string(),
        Value::Array(
            calls
                .iter()
                .map(|call| sanitize_payload(&serde_json::to_value(call).unwrap_or(Value::Null)))
                .collect(),
        ),
    );

    let mut artifacts = Map::new();
    artifacts.insert(
        "image_path".to_string(),
        Value::String(image_path.to_string_lossy().to_string()),
    );
    artifacts.insert(
        "receipt_path".to_string(),
        Value::String(receipt_path.to_string_lossy().to_string()),
    );
    root.insert("artifacts".to_string(), Value::Object(artifacts));
    root.insert(
        "result_metadata".to_string(),
        sanitize_payload(&Value::Object(result_metadata.clone())),
    );
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

/// Replaces inline image payloads so receipts stay small.
pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(
                    lowered.as_str(),
                    "data" | "inlinedata" | "inline_data" | "image_bytes"
                ) {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{
        build_receipt, sanitize_payload, write_receipt, CallRecord, TryOnRequest,
        RECEIPT_SCHEMA_VERSION,
    };

    #[test]
    fn receipt_builder_writes_expected_shape() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let receipt_path = temp.path().join("receipt-tryon-1.json");
        let image_path = temp.path().join("tryon-1.png");
        std::fs::write(&image_path, b"png")?;

        let request = TryOnRequest {
            person_digest: "aa".to_string(),
            garment_digest: "bb".to_string(),
            garment_source: "shirt.png".to_string(),
            pose: "original".to_string(),
            instructions: "tuck it in".to_string(),
            text_model: "dryrun-text-1".to_string(),
            image_model: "dryrun-image-1".to_string(),
        };
        let mut backend_response = Map::new();
        backend_response.insert("data".to_string(), json!("AAAA"));
        backend_response.insert("finish_reason".to_string(), json!("STOP"));
        let calls = vec![CallRecord {
            purpose: "composite".to_string(),
            model: "dryrun-image-1".to_string(),
            ok: true,
            latency_ms: 12,
            prompt: "Dress the person".to_string(),
            backend_response,
            error: None,
        }];
        let mut result_metadata = Map::new();
        result_metadata.insert("recommendations".to_string(), json!(3));

        let payload = build_receipt(
            &request,
            &calls,
            &image_path,
            &receipt_path,
            &result_metadata,
        );
        write_receipt(&receipt_path, &payload)?;

        let raw = std::fs::read_to_string(&receipt_path)?;
        let parsed: Value = serde_json::from_str(&raw)?;
        assert_eq!(parsed["schema_version"], json!(RECEIPT_SCHEMA_VERSION));
        assert_eq!(parsed["request"]["instructions"], json!("tuck it in"));
        assert_eq!(parsed["calls"][0]["purpose"], json!("composite"));
        assert_eq!(parsed["calls"][0]["backend_response"]["data"], json!("<omitted>"));
        assert_eq!(
            parsed["artifacts"]["image_path"],
            json!(image_path.to_string_lossy())
        );
        assert_eq!(parsed["result_metadata"]["recommendations"], json!(3));
        Ok(())
    }

    #[test]
    fn sanitize_omits_nested_inline_images() {
        let cleaned = sanitize_payload(&json!({
            "parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}, {"text": "hi"}]
        }));
        assert_eq!(cleaned["parts"][0]["inlineData"], json!("<omitted>"));
        assert_eq!(cleaned["parts"][1]["text"], json!("hi"));
    }
}
