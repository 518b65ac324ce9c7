//! Community seeders: the curated roots trust propagates from.

use serde::{Deserialize, Serialize};

use crate::Pubkey;

/// A manually curated, trusted root key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Seeder {
    #[ts(type = "string")]
    pub pubkey: Pubkey,
    /// Free-text grouping label, e.g. "europe" or "latam".
    pub region: String,
    pub label: Option<String>,
    /// Admin that registered the seeder.
    #[ts(type = "string")]
    pub added_by: Pubkey,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Mutable fields of a seeder. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SeederUpdate {
    pub region: Option<String>,
    pub label: Option<String>,
}

impl SeederUpdate {
    /// True when the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.label.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeder_json_is_camel_case() {
        let pk = Pubkey::from_bytes(&[7u8; 32]);
        let seeder = Seeder {
            pubkey: pk.clone(),
            region: "europe".into(),
            label: Some("Alice".into()),
            added_by: pk,
            created_at: 10,
            updated_at: 10,
        };
        let json = serde_json::to_value(&seeder).expect("serialize");
        assert!(json.get("addedBy").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["region"], "europe");
    }

    #[test]
    fn test_update_is_empty() {
        assert!(SeederUpdate::default().is_empty());
        let update = SeederUpdate {
            region: None,
            label: Some("x".into()),
        };
        assert!(!update.is_empty());
    }
}
