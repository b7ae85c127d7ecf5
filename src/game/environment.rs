//! Destructible scenery - arena layout and the destroy/respawn lifecycle

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::ws::protocol::ObjectKind;

impl ObjectKind {
    /// Full health for a freshly placed or respawned object
    pub fn max_health(self) -> f32 {
        match self {
            ObjectKind::Fence => 100.0,
            ObjectKind::HayBale => 30.0,
            ObjectKind::Barn => 80.0,
            ObjectKind::House => 100.0,
            ObjectKind::Car => 60.0,
        }
    }

    /// Whether charge hits damage this kind at all
    pub fn destructible(self) -> bool {
        !matches!(self, ObjectKind::Fence)
    }

    /// Score awarded to the attacker per damaging hit
    pub fn score_bonus(self) -> f32 {
        match self {
            ObjectKind::Fence => 0.0,
            ObjectKind::HayBale => 5.0,
            ObjectKind::Barn => 20.0,
            ObjectKind::House => 25.0,
            ObjectKind::Car => 15.0,
        }
    }

    /// Whether destroyed objects of this kind come back. Cars stay wrecked.
    pub fn respawns(self) -> bool {
        matches!(self, ObjectKind::HayBale | ObjectKind::Barn | ObjectKind::House)
    }
}

/// Scenery object in the arena (authoritative)
#[derive(Debug, Clone)]
pub struct EnvironmentObject {
    /// Stable across respawns
    pub id: u32,
    pub kind: ObjectKind,
    /// AABB top-left corner
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub health: f32,
    /// None means the object never comes back once destroyed
    pub respawn_delay_ms: Option<u64>,
}

impl EnvironmentObject {
    fn new(
        id: u32,
        kind: ObjectKind,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        respawn_delay_ms: u64,
    ) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            width,
            height,
            health: kind.max_health(),
            respawn_delay_ms: kind.respawns().then_some(respawn_delay_ms),
        }
    }
}

/// A destroyed object waiting to be reinserted
#[derive(Debug, Clone)]
pub struct PendingRespawn {
    pub object: EnvironmentObject,
    /// World tick at which the object reappears
    pub due_tick: u64,
}

/// Generate the fixed arena layout: perimeter fences, scattered hay bales,
/// a cluster of houses, a few barns, a few cars.
pub fn generate_layout(
    rng: &mut ChaCha8Rng,
    game: &GameConfig,
) -> HashMap<u32, EnvironmentObject> {
    let mut objects = HashMap::new();
    let mut next_id: u32 = 0;
    let mut place = |objects: &mut HashMap<u32, EnvironmentObject>,
                     kind: ObjectKind,
                     x: f32,
                     y: f32,
                     w: f32,
                     h: f32| {
        let id = next_id;
        next_id += 1;
        objects.insert(
            id,
            EnvironmentObject::new(id, kind, x, y, w, h, game.respawn_delay_ms),
        );
    };

    let (w, h) = (game.map_width, game.map_height);

    // Perimeter fences in fixed-length segments
    const FENCE_LEN: f32 = 100.0;
    const FENCE_THICKNESS: f32 = 20.0;
    let mut x = 0.0;
    while x < w {
        let seg = FENCE_LEN.min(w - x);
        place(&mut objects, ObjectKind::Fence, x, 0.0, seg, FENCE_THICKNESS);
        place(
            &mut objects,
            ObjectKind::Fence,
            x,
            h - FENCE_THICKNESS,
            seg,
            FENCE_THICKNESS,
        );
        x += FENCE_LEN;
    }
    let mut y = FENCE_THICKNESS;
    while y < h - FENCE_THICKNESS {
        let seg = FENCE_LEN.min(h - FENCE_THICKNESS - y);
        place(&mut objects, ObjectKind::Fence, 0.0, y, FENCE_THICKNESS, seg);
        place(
            &mut objects,
            ObjectKind::Fence,
            w - FENCE_THICKNESS,
            y,
            FENCE_THICKNESS,
            seg,
        );
        y += FENCE_LEN;
    }

    // Hay bales scattered across the open field
    for _ in 0..12 {
        let bx = rng.gen_range(w * 0.1..w * 0.9);
        let by = rng.gen_range(h * 0.1..h * 0.9);
        place(&mut objects, ObjectKind::HayBale, bx, by, 40.0, 40.0);
    }

    // House cluster, offset from center
    let (cx, cy) = (w * 0.6, h * 0.35);
    for _ in 0..5 {
        let hx = cx + rng.gen_range(-150.0..150.0);
        let hy = cy + rng.gen_range(-150.0..150.0);
        place(&mut objects, ObjectKind::House, hx, hy, 120.0, 100.0);
    }

    // A few barns
    for _ in 0..3 {
        let bx = rng.gen_range(w * 0.1..w * 0.9);
        let by = rng.gen_range(h * 0.1..h * 0.9);
        place(&mut objects, ObjectKind::Barn, bx, by, 160.0, 120.0);
    }

    // A few cars
    for _ in 0..4 {
        let vx = rng.gen_range(w * 0.1..w * 0.9);
        let vy = rng.gen_range(h * 0.1..h * 0.9);
        place(&mut objects, ObjectKind::Car, vx, vy, 80.0, 45.0);
    }

    info!(object_count = objects.len(), "Arena layout generated");
    objects
}

/// Environment lifecycle, evaluated once per tick
pub struct EnvironmentSystem;

impl EnvironmentSystem {
    /// Retire objects destroyed this tick and reinsert any whose respawn
    /// deadline has arrived.
    pub fn maintain(
        active: &mut HashMap<u32, EnvironmentObject>,
        pending: &mut Vec<PendingRespawn>,
        tick: u64,
        game: &GameConfig,
    ) {
        let destroyed: Vec<u32> = active
            .values()
            .filter(|o| o.health <= 0.0)
            .map(|o| o.id)
            .collect();

        for id in destroyed {
            if let Some(object) = active.remove(&id) {
                match object.respawn_delay_ms {
                    Some(delay_ms) => {
                        let due_tick = tick + game.ticks_for_millis(delay_ms);
                        debug!(object_id = id, kind = ?object.kind, due_tick, "Object destroyed, respawn scheduled");
                        pending.push(PendingRespawn { object, due_tick });
                    }
                    None => {
                        debug!(object_id = id, kind = ?object.kind, "Object destroyed permanently");
                    }
                }
            }
        }

        let mut i = 0;
        while i < pending.len() {
            if pending[i].due_tick <= tick {
                let mut respawn = pending.swap_remove(i);
                respawn.object.health = respawn.object.kind.max_health();
                debug!(object_id = respawn.object.id, kind = ?respawn.object.kind, "Object respawned");
                active.insert(respawn.object.id, respawn.object);
            } else {
                i += 1;
            }
        }
    }
}
