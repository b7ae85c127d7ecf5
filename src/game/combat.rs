//! Combat resolution - charge hits between players and against scenery

use std::collections::HashMap;

use rand_chacha::ChaCha8Rng;
use tracing::debug;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::environment::EnvironmentObject;
use crate::game::world::PlayerState;
use crate::game::StatsUpdate;

/// Half-extent of the square hit box around a player's center, used for
/// player-vs-object overlap tests.
pub const PLAYER_HIT_HALF_EXTENT: f32 = 20.0;

/// Combat resolver, invoked once per tick by the scheduler
pub struct CombatSystem;

impl CombatSystem {
    /// Resolve all charge collisions for this tick. Damage is applied
    /// immediately per pair; a player dropping to zero health respawns in
    /// place within the same call. Returns persistence deltas for hits.
    pub fn resolve(
        players: &mut HashMap<Uuid, PlayerState>,
        environment: &mut HashMap<u32, EnvironmentObject>,
        game: &GameConfig,
        rng: &mut ChaCha8Rng,
    ) -> Vec<StatsUpdate> {
        let mut stats = Vec::new();
        Self::resolve_players(players, game, rng, &mut stats);
        Self::resolve_environment(players, environment, game);
        stats
    }

    /// Player-vs-player: every ordered pair where the attacker is charging
    fn resolve_players(
        players: &mut HashMap<Uuid, PlayerState>,
        game: &GameConfig,
        rng: &mut ChaCha8Rng,
        stats: &mut Vec<StatsUpdate>,
    ) {
        // Sorted ids keep pair evaluation deterministic for a given state
        let mut ids: Vec<Uuid> = players.keys().copied().collect();
        ids.sort_unstable();

        for &attacker_id in &ids {
            let (ax, ay, charging) = match players.get(&attacker_id) {
                Some(a) => (a.x, a.y, a.charging),
                None => continue,
            };
            if !charging {
                continue;
            }

            for &target_id in &ids {
                if target_id == attacker_id {
                    continue;
                }
                // Positions re-read per pair: an earlier hit may have
                // respawned this target elsewhere.
                let in_range = match players.get(&target_id) {
                    Some(t) => {
                        let (dx, dy) = (t.x - ax, t.y - ay);
                        dx * dx + dy * dy < game.collision_radius * game.collision_radius
                    }
                    None => false,
                };
                if !in_range {
                    continue;
                }

                let mut defeated = false;
                if let Some(target) = players.get_mut(&target_id) {
                    let (health, killed) = apply_damage(target.health, game.charge_damage);
                    target.health = health;
                    if killed {
                        target.respawn(game, rng);
                        defeated = true;
                    }
                }

                if let Some(attacker) = players.get_mut(&attacker_id) {
                    attacker.score += game.charge_damage;
                    attacker.damage_dealt += game.charge_damage;
                    if defeated {
                        attacker.score += game.defeat_bonus;
                    }
                    stats.push(StatsUpdate {
                        record_id: attacker.record_id,
                        damage_delta: game.charge_damage,
                        distance_delta: 0.0,
                    });
                }

                debug!(
                    attacker = %attacker_id,
                    target = %target_id,
                    damage = game.charge_damage,
                    defeated,
                    "Charge hit"
                );
            }
        }
    }

    /// Player-vs-environment: AABB overlap while charging damages the object
    /// and awards a kind-specific score bonus. Fences shrug it off.
    fn resolve_environment(
        players: &mut HashMap<Uuid, PlayerState>,
        environment: &mut HashMap<u32, EnvironmentObject>,
        game: &GameConfig,
    ) {
        for player in players.values_mut() {
            if !player.charging {
                continue;
            }

            for object in environment.values_mut() {
                if !player_overlaps_object(player.x, player.y, object) {
                    continue;
                }
                if !object.kind.destructible() {
                    continue;
                }

                object.health = (object.health - game.env_damage).max(0.0);
                player.score += object.kind.score_bonus();
                debug!(
                    player = %player.id,
                    object_id = object.id,
                    kind = ?object.kind,
                    remaining = object.health,
                    "Object hit"
                );
            }
        }
    }
}

/// Apply damage with a floor of zero, returning (new_health, defeated)
pub fn apply_damage(health: f32, damage: f32) -> (f32, bool) {
    let new_health = (health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}

/// AABB overlap between a player's hit box and an object's box
pub fn player_overlaps_object(px: f32, py: f32, object: &EnvironmentObject) -> bool {
    let (left, right) = (px - PLAYER_HIT_HALF_EXTENT, px + PLAYER_HIT_HALF_EXTENT);
    let (top, bottom) = (py - PLAYER_HIT_HALF_EXTENT, py + PLAYER_HIT_HALF_EXTENT);
    left < object.x + object.width
        && right > object.x
        && top < object.y + object.height
        && bottom > object.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ObjectKind;
    use rand::SeedableRng;

    fn world_pair(ax: f32, bx: f32) -> (HashMap<Uuid, PlayerState>, Uuid, Uuid) {
        let mut players = HashMap::new();
        let a = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), "a".into(), ax, 500.0);
        let b = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), "b".into(), bx, 500.0);
        let (a_id, b_id) = (a.id, b.id);
        players.insert(a_id, a);
        players.insert(b_id, b);
        (players, a_id, b_id)
    }

    fn object_at(id: u32, kind: ObjectKind, x: f32, y: f32) -> EnvironmentObject {
        EnvironmentObject {
            id,
            kind,
            x,
            y,
            width: 40.0,
            height: 40.0,
            health: kind.max_health(),
            respawn_delay_ms: kind.respawns().then_some(1000),
        }
    }

    #[test]
    fn charging_player_damages_nearby_player() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        // Distance 30 < collision radius 50
        let (mut players, a_id, b_id) = world_pair(500.0, 530.0);
        players.get_mut(&a_id).unwrap().charging = true;

        let mut environment = HashMap::new();
        let stats = CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        let b = &players[&b_id];
        assert_eq!(b.health, 100.0 - game.charge_damage);
        assert!(!b.charging);

        let a = &players[&a_id];
        assert_eq!(a.score, game.charge_damage);
        assert_eq!(a.damage_dealt, game.charge_damage);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].record_id, a.record_id);
        assert_eq!(stats[0].damage_delta, game.charge_damage);
        assert_eq!(stats[0].distance_delta, 0.0);
    }

    #[test]
    fn out_of_range_pair_is_untouched() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (mut players, a_id, b_id) = world_pair(500.0, 560.0);
        players.get_mut(&a_id).unwrap().charging = true;

        let mut environment = HashMap::new();
        let stats = CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        assert_eq!(players[&b_id].health, 100.0);
        assert!(stats.is_empty());
    }

    #[test]
    fn non_charging_player_deals_nothing() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (mut players, a_id, b_id) = world_pair(500.0, 530.0);

        let mut environment = HashMap::new();
        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        assert_eq!(players[&a_id].health, 100.0);
        assert_eq!(players[&b_id].health, 100.0);
    }

    #[test]
    fn lethal_hit_respawns_target_and_awards_defeat_bonus() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (mut players, a_id, b_id) = world_pair(500.0, 530.0);
        players.get_mut(&a_id).unwrap().charging = true;
        players.get_mut(&b_id).unwrap().health = 5.0;

        let (old_x, old_y) = {
            let b = &players[&b_id];
            (b.x, b.y)
        };

        let mut environment = HashMap::new();
        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        let b = &players[&b_id];
        assert_eq!(b.health, 100.0, "defeated player respawns at full health");
        assert!(
            b.x != old_x || b.y != old_y,
            "respawn should relocate the player"
        );

        let a = &players[&a_id];
        assert_eq!(a.score, game.charge_damage + game.defeat_bonus);
        // Bonus never counts toward damage dealt
        assert_eq!(a.damage_dealt, game.charge_damage);
    }

    #[test]
    fn mutual_charges_damage_both_sides() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (mut players, a_id, b_id) = world_pair(500.0, 530.0);
        players.get_mut(&a_id).unwrap().charging = true;
        players.get_mut(&b_id).unwrap().charging = true;

        let mut environment = HashMap::new();
        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        assert_eq!(players[&a_id].health, 100.0 - game.charge_damage);
        assert_eq!(players[&b_id].health, 100.0 - game.charge_damage);
    }

    #[test]
    fn charging_into_hay_bale_damages_it_and_scores() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut players = HashMap::new();
        let mut a = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), "a".into(), 500.0, 500.0);
        a.charging = true;
        let a_id = a.id;
        players.insert(a_id, a);

        let mut environment = HashMap::new();
        // Box overlapping the player's hit box
        environment.insert(1, object_at(1, ObjectKind::HayBale, 490.0, 490.0));

        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        let bale = &environment[&1];
        assert_eq!(bale.health, ObjectKind::HayBale.max_health() - game.env_damage);
        assert_eq!(players[&a_id].score, ObjectKind::HayBale.score_bonus());
        assert_eq!(players[&a_id].damage_dealt, 0.0);
    }

    #[test]
    fn fences_are_immune_and_award_nothing() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut players = HashMap::new();
        let mut a = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), "a".into(), 500.0, 500.0);
        a.charging = true;
        let a_id = a.id;
        players.insert(a_id, a);

        let mut environment = HashMap::new();
        environment.insert(2, object_at(2, ObjectKind::Fence, 490.0, 490.0));

        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);

        assert_eq!(environment[&2].health, ObjectKind::Fence.max_health());
        assert_eq!(players[&a_id].score, 0.0);
    }

    #[test]
    fn non_charging_overlap_leaves_objects_alone() {
        let game = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut players = HashMap::new();
        let a = PlayerState::new(Uuid::new_v4(), Uuid::new_v4(), "a".into(), 500.0, 500.0);
        players.insert(a.id, a);

        let mut environment = HashMap::new();
        environment.insert(1, object_at(1, ObjectKind::House, 490.0, 490.0));

        CombatSystem::resolve(&mut players, &mut environment, &game, &mut rng);
        assert_eq!(environment[&1].health, ObjectKind::House.max_health());
    }

    #[test]
    fn aabb_overlap_edges() {
        let object = object_at(1, ObjectKind::HayBale, 100.0, 100.0);
        // Touching exactly at the edge is not an overlap
        assert!(!player_overlaps_object(
            100.0 - PLAYER_HIT_HALF_EXTENT,
            120.0,
            &object
        ));
        assert!(player_overlaps_object(110.0, 110.0, &object));
        assert!(!player_overlaps_object(300.0, 300.0, &object));
    }

    #[test]
    fn apply_damage_clamps_at_zero() {
        assert_eq!(apply_damage(5.0, 25.0), (0.0, true));
        assert_eq!(apply_damage(100.0, 25.0), (75.0, false));
        assert_eq!(apply_damage(25.0, 25.0), (0.0, true));
    }
}
