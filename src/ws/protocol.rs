//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment object kinds placed in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Perimeter fencing, indestructible
    Fence,
    /// Scattered bales, quick to flatten
    HayBale,
    /// Sturdy outbuildings
    Barn,
    /// Clustered houses
    House,
    /// Parked cars, gone for good once wrecked
    Car,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the arena under a display tag
    Join {
        /// Persisted identity key; not guaranteed unique across live players
        tag: String,
    },

    /// Set the absolute position the player is heading for
    Move { x: f32, y: f32 },

    /// Toggle charging (faster movement, deals collision damage)
    Charge { active: bool },

    /// Leave the arena
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First frame after a successful join
    #[serde(rename_all = "camelCase")]
    Init {
        player_id: Uuid,
        state: WorldView,
    },

    /// Full world snapshot, sent every tick
    Snapshot {
        players: Vec<PlayerView>,
        environment: Vec<ObjectView>,
    },

    /// Error before a server-initiated close
    Error { code: String, message: String },
}

/// Complete world contents as sent on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldView {
    pub players: Vec<PlayerView>,
    pub environment: Vec<ObjectView>,
}

/// Player entry in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub tag: String,
    pub x: f32,
    pub y: f32,
    /// Facing in radians
    pub direction: f32,
    /// Health (0-100)
    pub health: f32,
    pub score: f32,
    pub is_charging: bool,
    pub damage_dealt: f32,
    pub distance_walked: f32,
}

/// Environment object entry in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectView {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub health: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join","tag":"alice"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Join { ref tag } if tag == "alice"));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"move","x":10.5,"y":-3.0}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Move { x, y } if x == 10.5 && y == -3.0));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"charge","active":true}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Charge { active: true }));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Leave));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport","x":0}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"tag":"no-type"}"#).is_err());
    }

    #[test]
    fn snapshot_fields_use_camel_case() {
        let view = PlayerView {
            id: Uuid::nil(),
            tag: "bess".to_string(),
            x: 1.0,
            y: 2.0,
            direction: 0.0,
            health: 100.0,
            score: 0.0,
            is_charging: false,
            damage_dealt: 0.0,
            distance_walked: 0.0,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"isCharging\""));
        assert!(json.contains("\"damageDealt\""));
        assert!(json.contains("\"distanceWalked\""));
    }

    #[test]
    fn object_view_serializes_kind_as_type() {
        let view = ObjectView {
            id: 7,
            kind: ObjectKind::HayBale,
            x: 0.0,
            y: 0.0,
            width: 40.0,
            height: 40.0,
            health: 30.0,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"type\":\"hay_bale\""));
    }

    #[test]
    fn init_message_carries_player_id_and_state() {
        let msg = ServerMsg::Init {
            player_id: Uuid::nil(),
            state: WorldView {
                players: vec![],
                environment: vec![],
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"init\""));
        assert!(json.contains("\"playerId\""));
        assert!(json.contains("\"environment\""));
    }
}
