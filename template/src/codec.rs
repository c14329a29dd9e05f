//! On-disk format of the template registry.
//!
//! ```text
//! {
//!   "version": 1,
//!   "dim": 128,
//!   "next_seq": 3,
//!   "templates": [
//!     { "identity": "P1", "seq": 1, "embeddings": ["<base64 f32le>", ...] },
//!     ...
//!   ]
//! }
//! ```
//!
//! Embeddings are stored as base64 of their little-endian f32 bytes so
//! vectors survive save/load bit for bit.

use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use facetriage_store::Identity;
use serde::{Deserialize, Serialize};

use crate::store::TemplateSnapshot;
use crate::template::Template;
use crate::TemplateError;

/// Blob name of the template registry.
pub const TEMPLATE_FILE: &str = "templates.json";

/// Current format version.
pub const TEMPLATE_FILE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TemplateFile {
    version: u32,
    dim: usize,
    next_seq: u64,
    templates: Vec<TemplateEntry>,
}

#[derive(Serialize, Deserialize)]
struct TemplateEntry {
    identity: Identity,
    seq: u64,
    embeddings: Vec<String>,
}

/// Serializes a snapshot.
pub fn encode(snapshot: &TemplateSnapshot) -> Result<Vec<u8>, TemplateError> {
    let file = TemplateFile {
        version: TEMPLATE_FILE_VERSION,
        dim: snapshot.dim(),
        next_seq: snapshot.next_seq(),
        templates: snapshot
            .templates()
            .map(|t| TemplateEntry {
                identity: t.identity.clone(),
                seq: t.seq,
                embeddings: t.embeddings.iter().map(|e| encode_vector(e)).collect(),
            })
            .collect(),
    };
    serde_json::to_vec_pretty(&file).map_err(|e| corrupt(e.to_string()))
}

/// Parses and validates a snapshot of dimension `dim`.
pub fn decode(data: &[u8], dim: usize) -> Result<TemplateSnapshot, TemplateError> {
    let file: TemplateFile = serde_json::from_slice(data).map_err(|e| corrupt(e.to_string()))?;

    if file.version != TEMPLATE_FILE_VERSION {
        return Err(corrupt(format!("unsupported version {}", file.version)));
    }
    if file.dim != dim {
        return Err(corrupt(format!(
            "dimension {} does not match configured {dim}",
            file.dim
        )));
    }

    let mut seen = HashSet::with_capacity(file.templates.len());
    let mut templates = Vec::with_capacity(file.templates.len());
    for entry in file.templates {
        if !seen.insert(entry.identity.clone()) {
            return Err(corrupt(format!("duplicate identity {}", entry.identity)));
        }
        if entry.seq >= file.next_seq {
            return Err(corrupt(format!(
                "{}: seq {} not below next_seq {}",
                entry.identity, entry.seq, file.next_seq
            )));
        }
        if entry.embeddings.is_empty() {
            return Err(corrupt(format!("{}: no embeddings", entry.identity)));
        }
        let embeddings = entry
            .embeddings
            .iter()
            .map(|s| decode_vector(s, dim))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| corrupt(format!("{}: {reason}", entry.identity)))?;
        templates.push(Template::new(entry.identity, entry.seq, embeddings));
    }
    templates.sort_by_key(|t| t.seq);

    Ok(TemplateSnapshot::from_parts(dim, templates, file.next_seq))
}

fn encode_vector(v: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

fn decode_vector(s: &str, dim: usize) -> Result<Vec<f32>, String> {
    let bytes = STANDARD.decode(s).map_err(|e| format!("bad base64: {e}"))?;
    if bytes.len() != dim * 4 {
        return Err(format!(
            "embedding has {} bytes, want {}",
            bytes.len(),
            dim * 4
        ));
    }
    let v: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if v.iter().any(|x| !x.is_finite()) {
        return Err("non-finite component".into());
    }
    Ok(v)
}

fn corrupt(reason: String) -> TemplateError {
    TemplateError::CorruptPersistedData {
        name: TEMPLATE_FILE.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn sample() -> TemplateSnapshot {
        TemplateSnapshot::from_parts(
            3,
            vec![
                Template::new(id("P1"), 0, vec![vec![0.1, 0.2, 0.3], vec![1e-7, -2.5, 3.3]]),
                Template::new(id("P2"), 2, vec![vec![f32::MIN_POSITIVE, f32::MAX, -0.0]]),
            ],
            3,
        )
    }

    #[test]
    fn vectors_are_bit_exact() {
        let snap = sample();
        let decoded = decode(&encode(&snap).unwrap(), 3).unwrap();
        for (a, b) in snap.templates().zip(decoded.templates()) {
            assert_eq!(a.identity, b.identity);
            assert_eq!(a.seq, b.seq);
            for (va, vb) in a.embeddings.iter().zip(&b.embeddings) {
                let bits_a: Vec<u32> = va.iter().map(|x| x.to_bits()).collect();
                let bits_b: Vec<u32> = vb.iter().map(|x| x.to_bits()).collect();
                assert_eq!(bits_a, bits_b);
            }
        }
        assert_eq!(decoded.next_seq(), 3);
    }

    #[test]
    fn encode_is_stable() {
        let bytes = encode(&sample()).unwrap();
        let again = encode(&decode(&bytes, 3).unwrap()).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn rejects_garbage() {
        let err = decode(b"{not json", 3).unwrap_err();
        assert!(matches!(err, TemplateError::CorruptPersistedData { .. }));
    }

    #[test]
    fn rejects_dimension_change() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes, 4).unwrap_err();
        match err {
            TemplateError::CorruptPersistedData { reason, .. } => {
                assert!(reason.contains("dimension"), "{reason}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_vector() {
        let json = format!(
            r#"{{"version":1,"dim":3,"next_seq":1,"templates":[{{"identity":"P1","seq":0,"embeddings":["{}"]}}]}}"#,
            STANDARD.encode([0u8; 8])
        );
        assert!(matches!(
            decode(json.as_bytes(), 3),
            Err(TemplateError::CorruptPersistedData { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_identity() {
        let v = STANDARD.encode([0u8; 4]);
        let json = format!(
            r#"{{"version":1,"dim":1,"next_seq":2,"templates":[
                {{"identity":"P1","seq":0,"embeddings":["{v}"]}},
                {{"identity":"P1","seq":1,"embeddings":["{v}"]}}]}}"#
        );
        assert!(matches!(
            decode(json.as_bytes(), 1),
            Err(TemplateError::CorruptPersistedData { .. })
        ));
    }

    #[test]
    fn rejects_reserved_identity() {
        let v = STANDARD.encode([0u8; 4]);
        let json = format!(
            r#"{{"version":1,"dim":1,"next_seq":1,"templates":[{{"identity":"unknown","seq":0,"embeddings":["{v}"]}}]}}"#
        );
        assert!(matches!(
            decode(json.as_bytes(), 1),
            Err(TemplateError::CorruptPersistedData { .. })
        ));
    }
}
