//! Snapshot building for network transmission

use std::collections::HashMap;

use uuid::Uuid;

use crate::ws::protocol::{ObjectView, PlayerView, ServerMsg, WorldView};

use super::environment::EnvironmentObject;
use super::world::PlayerState;

/// Project the world into wire views, sorted by id for deterministic output
pub fn build_view(
    players: &HashMap<Uuid, PlayerState>,
    environment: &HashMap<u32, EnvironmentObject>,
) -> WorldView {
    let mut player_views: Vec<PlayerView> = players
        .values()
        .map(|p| PlayerView {
            id: p.id,
            tag: p.tag.clone(),
            x: p.x,
            y: p.y,
            direction: p.direction,
            health: p.health,
            score: p.score,
            is_charging: p.charging,
            damage_dealt: p.damage_dealt,
            distance_walked: p.distance_walked,
        })
        .collect();
    player_views.sort_by_key(|p| p.id);

    let mut object_views: Vec<ObjectView> = environment
        .values()
        .map(|o| ObjectView {
            id: o.id,
            kind: o.kind,
            x: o.x,
            y: o.y,
            width: o.width,
            height: o.height,
            health: o.health,
        })
        .collect();
    object_views.sort_by_key(|o| o.id);

    WorldView {
        players: player_views,
        environment: object_views,
    }
}

/// Per-tick full snapshot message
pub fn build_snapshot(
    players: &HashMap<Uuid, PlayerState>,
    environment: &HashMap<u32, EnvironmentObject>,
) -> ServerMsg {
    let view = build_view(players, environment);
    ServerMsg::Snapshot {
        players: view.players,
        environment: view.environment,
    }
}

/// First frame for a freshly joined connection
pub fn build_init(
    player_id: Uuid,
    players: &HashMap<Uuid, PlayerState>,
    environment: &HashMap<u32, EnvironmentObject>,
) -> ServerMsg {
    ServerMsg::Init {
        player_id,
        state: build_view(players, environment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ObjectKind;

    fn sample_world() -> (HashMap<Uuid, PlayerState>, HashMap<u32, EnvironmentObject>) {
        let mut players = HashMap::new();
        for tag in ["a", "b", "c"] {
            let p = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), tag.to_string(), 10.0, 20.0);
            players.insert(p.id, p);
        }

        let mut environment = HashMap::new();
        for id in [5u32, 1, 3] {
            environment.insert(
                id,
                EnvironmentObject {
                    id,
                    kind: ObjectKind::HayBale,
                    x: id as f32,
                    y: 0.0,
                    width: 40.0,
                    height: 40.0,
                    health: 30.0,
                    respawn_delay_ms: Some(1000),
                },
            );
        }
        (players, environment)
    }

    #[test]
    fn views_are_sorted_by_id() {
        let (players, environment) = sample_world();
        let view = build_view(&players, &environment);

        let player_ids: Vec<Uuid> = view.players.iter().map(|p| p.id).collect();
        let mut sorted = player_ids.clone();
        sorted.sort();
        assert_eq!(player_ids, sorted);

        let object_ids: Vec<u32> = view.environment.iter().map(|o| o.id).collect();
        assert_eq!(object_ids, vec![1, 3, 5]);
    }

    #[test]
    fn snapshot_carries_all_mutable_player_fields() {
        let (mut players, environment) = sample_world();
        let some_id = *players.keys().next().unwrap();
        {
            let p = players.get_mut(&some_id).unwrap();
            p.health = 42.0;
            p.charging = true;
            p.score = 75.0;
            p.damage_dealt = 25.0;
            p.distance_walked = 123.4;
        }

        let view = build_view(&players, &environment);
        let entry = view.players.iter().find(|p| p.id == some_id).unwrap();
        assert_eq!(entry.health, 42.0);
        assert!(entry.is_charging);
        assert_eq!(entry.score, 75.0);
        assert_eq!(entry.damage_dealt, 25.0);
        assert_eq!(entry.distance_walked, 123.4);
    }

    #[test]
    fn init_wraps_the_same_view() {
        let (players, environment) = sample_world();
        let id = *players.keys().next().unwrap();
        match build_init(id, &players, &environment) {
            ServerMsg::Init { player_id, state } => {
                assert_eq!(player_id, id);
                assert_eq!(state.players.len(), 3);
                assert_eq!(state.environment.len(), 3);
            }
            other => panic!("expected init, got {:?}", other),
        }
    }
}
