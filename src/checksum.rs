use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 over a canonical serialization of a JSON value, as lowercase hex.
///
/// Object keys are sorted recursively so that two values with identical
/// content always hash identically, whatever order their fields were built
/// in. This is the primary key for idempotent course upserts and the
/// synthetic external id for personnel without a natural identifier.
pub fn checksum(value: &Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    let mut hasher = Sha256::new();
    hasher.update(buf.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
