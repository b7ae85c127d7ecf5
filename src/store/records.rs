//! Persisted per-player records and lifetime totals

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Durable per-player record, keyed by tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub tag: String,
    pub total_damage: f32,
    pub total_distance: f32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// New record for insertion
#[derive(Debug, Clone, Serialize)]
struct NewRecord {
    id: Uuid,
    tag: String,
    total_damage: f32,
    total_distance: f32,
}

/// Arguments for the stats accumulation RPC
#[derive(Debug, Clone, Serialize)]
struct AccumulateArgs {
    record_id: Uuid,
    damage_delta: f32,
    distance_delta: f32,
}

/// Player record store operations (the persistence gateway)
#[derive(Clone)]
pub struct RecordStore {
    client: SupabaseClient,
}

impl RecordStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Look up a record by display tag
    pub async fn find_by_tag(&self, tag: &str) -> Result<Option<PlayerRecord>, SupabaseError> {
        let query = format!("tag=eq.{}", tag);
        self.client.get_one("player_records", &query).await
    }

    /// Create a new record with zeroed totals
    pub async fn create(&self, tag: &str) -> Result<PlayerRecord, SupabaseError> {
        let record = NewRecord {
            id: Uuid::new_v4(),
            tag: tag.to_string(),
            total_damage: 0.0,
            total_distance: 0.0,
        };
        self.client.insert("player_records", &record).await
    }

    /// Find or create the record for a tag (join path)
    pub async fn ensure(&self, tag: &str) -> Result<PlayerRecord, SupabaseError> {
        match self.find_by_tag(tag).await? {
            Some(record) => Ok(record),
            None => self.create(tag).await,
        }
    }

    /// Add deltas to the lifetime totals. Incremented server-side via RPC so
    /// concurrent sessions never lose updates.
    pub async fn accumulate_stats(
        &self,
        record_id: Uuid,
        damage_delta: f32,
        distance_delta: f32,
    ) -> Result<(), SupabaseError> {
        let args = AccumulateArgs {
            record_id,
            damage_delta,
            distance_delta,
        };
        self.client.rpc("accumulate_player_stats", &args).await
    }
}
