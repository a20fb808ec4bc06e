//! Snapshot reconciliation.
//!
//! Turns one decoded [`Snapshot`] into entity store edits. Per dialect part
//! the order is fixed:
//!
//! 1. own player entry -> local state (noting a death), `Match -> Start`
//! 2. other player entries -> enemy upserts
//! 3. explicit removals
//! 4. bullets (flat: upsert then prune; delta: add/move/remove)
//! 5. obstacles (delta only)
//! 6. countdown
//! 7. end of match
//!
//! When a message carries both dialects the flat part is applied first, so
//! the delta part's explicit intents win.

use std::collections::BTreeSet;

use arena_shared::{
    snapshot::{
        BulletDelta, DeltaSnapshot, FlatSnapshot, ObstacleDelta, PlayerEntry, Snapshot,
        SnapshotPart,
    },
    state::SessionState,
};
use tracing::{debug, trace};

use crate::{
    store::MAX_HP,
    world::{ClientWorld, LocalPlayerState},
};

/// What a snapshot changed, for the session to forward to the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Set when the message carried our own entry.
    pub local: Option<LocalPlayerState>,
    /// Every forward state step, in the order taken. One message can both
    /// place us and end the match.
    pub transitions: Vec<SessionState>,
    /// Set when our hp dropped from alive to 0 in this message.
    pub died: bool,
    /// Set only when the countdown differs from the last known value.
    pub left_time: Option<u32>,
    pub enemies_upserted: usize,
    pub enemies_removed: usize,
    pub bullets_upserted: usize,
    pub bullets_removed: usize,
    pub obstacles_added: usize,
    pub obstacles_removed: usize,
}

/// Applies every part of `snapshot` to `world`, flat before delta.
pub fn reconcile(world: &mut ClientWorld, snapshot: &Snapshot) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    if !snapshot.ignored.is_empty() {
        trace!(fields = ?snapshot.ignored, "Ignoring unknown snapshot fields");
    }

    for part in &snapshot.parts {
        match part {
            SnapshotPart::Flat(flat) => apply_flat(world, flat, &mut report),
            SnapshotPart::Delta(delta) => apply_delta(world, delta, &mut report),
        }
    }

    report
}

fn apply_flat(world: &mut ClientWorld, flat: &FlatSnapshot, report: &mut ReconcileReport) {
    if let Some(users) = &flat.users {
        apply_players(world, users.iter(), report);
    }

    if let Some(gone) = &flat.outter {
        for id in gone {
            if world.store.remove_enemy(*id) {
                report.enemies_removed += 1;
            }
        }
    }

    if let Some(bullets) = &flat.bullets {
        let mut live = BTreeSet::new();
        for b in bullets {
            world.store.upsert_bullet(b.id, b.position());
            live.insert(b.id);
            report.bullets_upserted += 1;
        }
        report.bullets_removed += world.store.prune_bullets_not_in(&live);
    }

    if let Some(t) = flat.time {
        apply_time(world, t, report);
    }

    if flat.end {
        advance(world, SessionState::End, report);
    }
}

fn apply_delta(world: &mut ClientWorld, delta: &DeltaSnapshot, report: &mut ReconcileReport) {
    apply_players(world, delta.players(), report);

    for id in &delta.removed {
        if world.store.remove_enemy(*id) {
            report.enemies_removed += 1;
        }
    }

    if let Some(bullets) = &delta.bullets {
        apply_bullet_delta(world, bullets, report);
    }

    if let Some(obstacles) = &delta.obstacles {
        apply_obstacle_delta(world, obstacles, report);
    }

    if let Some(t) = delta.time {
        apply_time(world, t, report);
    }

    if delta.end {
        advance(world, SessionState::End, report);
    }
}

fn apply_players<'a>(
    world: &mut ClientWorld,
    players: impl Iterator<Item = &'a PlayerEntry>,
    report: &mut ReconcileReport,
) {
    // Own entry first so a message that places us always starts the match
    // before anything else in it is applied.
    let own_id = world.own_id;
    let (own, others): (Vec<&PlayerEntry>, Vec<&PlayerEntry>) =
        players.partition(|p| p.id == own_id);

    for p in own {
        let was_alive = world.local.hp > 0;
        world.local = LocalPlayerState {
            position: p.position(),
            hp: p.hp.map_or(world.local.hp, |hp| hp.clamp(0, MAX_HP)),
        };
        if was_alive && world.local.hp == 0 {
            debug!(player_id = %own_id, "Local player died");
            report.died = true;
        }
        report.local = Some(world.local);
        advance(world, SessionState::Start, report);
    }

    for p in others {
        let known = world.store.enemy(p.id);
        let hp = p.hp.or(known.map(|e| e.hp)).unwrap_or(MAX_HP);
        let facing = p.facing.or(known.map(|e| e.facing)).unwrap_or(0.0);
        if world.store.upsert_enemy(p.id, p.position(), hp, facing) {
            trace!(player_id = %p.id, "Enemy appeared");
        }
        report.enemies_upserted += 1;
    }
}

fn apply_bullet_delta(world: &mut ClientWorld, delta: &BulletDelta, report: &mut ReconcileReport) {
    for b in delta.add.iter().chain(delta.moved.iter()) {
        world.store.upsert_bullet(b.id, b.position());
        report.bullets_upserted += 1;
    }
    for id in &delta.remove {
        if world.store.remove_bullet(*id) {
            report.bullets_removed += 1;
        }
    }
}

fn apply_obstacle_delta(world: &mut ClientWorld, delta: &ObstacleDelta, report: &mut ReconcileReport) {
    for o in &delta.add {
        if world.store.upsert_obstacle(o.id, o.position(), o.size) {
            report.obstacles_added += 1;
        }
    }
    for id in &delta.del {
        if world.store.remove_obstacle(*id) {
            report.obstacles_removed += 1;
        }
    }
}

fn apply_time(world: &mut ClientWorld, secs: u32, report: &mut ReconcileReport) {
    if world.left_time != Some(secs) {
        world.left_time = Some(secs);
        report.left_time = Some(secs);
    }
}

fn advance(world: &mut ClientWorld, next: SessionState, report: &mut ReconcileReport) {
    match world.state.advance(next) {
        Ok(true) => {
            debug!(state = ?next, "Session state advanced");
            report.transitions.push(next);
        }
        Ok(false) => {}
        Err(e) => debug!(error = %e, "Ignoring state transition"),
    }
}
