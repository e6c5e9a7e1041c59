//! Synthetic payload generator for load tests: produces JSON-shaped blobs
//! used to drive the store (and, at scale, the ingestion consumer) without
//! needing a real upstream producer.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

const USERS: &[&str] = &["alice", "bob", "carol", "dave", "erin", "frank"];
const FIELDS: &[&str] = &["email", "plan", "status", "region", "quota"];

#[derive(Serialize)]
struct Blob<'a> {
    user: &'a str,
    field: &'a str,
    #[serde(rename = "newValue")]
    new_value: String,
    #[serde(rename = "oldValue")]
    old_value: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

/// Renders one synthetic JSON-shaped payload with randomized
/// user/field/new-value/old-value fields and an RFC3339-nanosecond
/// creation timestamp.
pub fn generate_blob(rng: &mut impl Rng) -> Vec<u8> {
    let user = USERS.choose(rng).copied().unwrap_or("alice");
    let field = FIELDS.choose(rng).copied().unwrap_or("status");
    let blob = Blob {
        user,
        field,
        new_value: format!("value-{}", rng.gen::<u32>()),
        old_value: format!("value-{}", rng.gen::<u32>()),
        created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
    };
    serde_json::to_vec(&blob).expect("blob template always serializes")
}

/// Renders `n` synthetic payloads.
pub fn generate_blobs(n: usize, rng: &mut impl Rng) -> Vec<Vec<u8>> {
    (0..n).map(|_| generate_blob(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn generated_blobs_are_valid_json_with_expected_fields() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let blobs = generate_blobs(10, &mut rng);
        assert_eq!(blobs.len(), 10);

        for blob in blobs {
            let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
            assert!(value.get("user").is_some());
            assert!(value.get("field").is_some());
            assert!(value.get("newValue").is_some());
            assert!(value.get("oldValue").is_some());
            assert!(value.get("createdAt").unwrap().as_str().unwrap().contains('T'));
        }
    }
}
