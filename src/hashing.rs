//! Batch Fingerprints - SHA-256 over canonical JSON
//!
//! A job hash identifies what was asked for (layout, size, records, engine);
//! a manifest hash seals what was produced. Re-running the same job yields
//! the same job hash and the same per-certificate hashes.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::layout::Layout;
use crate::pipeline::CompiledBatch;
use crate::records::Record;

const MANIFEST_HASH_KEY: &str = "manifestHash";

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compact JSON with object keys in byte order at every depth.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(value)?;
    sort_keys(&mut value);
    serde_json::to_string(&value)
}

fn sort_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, v) in fields.iter_mut() {
                sort_keys(v);
            }
            *map = fields.into_iter().collect::<Map<String, Value>>();
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobPayload<'a> {
    font_size: u32,
    records: &'a [Record],
}

/// sha256(`layout_id:layout_version:payload:engine_version`), where payload is
/// the canonical JSON of the font size and records.
pub fn job_hash(
    layout: &Layout,
    font_size: u32,
    records: &[Record],
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let payload = canonical_json(&JobPayload { font_size, records })?;
    let key = format!(
        "{}:{}:{}:{}",
        layout.id, layout.layout_version, payload, engine_version
    );
    Ok(sha256_hex(key.as_bytes()))
}

/// Hash of the batch manifest. The batch's own `manifestHash` is left out,
/// so the value can be recomputed from a finished batch.
pub fn manifest_hash(batch: &CompiledBatch) -> Result<String, serde_json::Error> {
    let mut manifest = serde_json::to_value(batch)?;
    if let Value::Object(fields) = &mut manifest {
        fields.remove(MANIFEST_HASH_KEY);
    }
    Ok(sha256_hex(canonical_json(&manifest)?.as_bytes()))
}
