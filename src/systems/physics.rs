//! Physics: Move-frame motion, drag release, thrown flight and bounces.
//!
//! The per-mode rules:
//! - Idle: the current Move frame's velocity (px/tick, mirrored when facing
//!   right) is applied and the pet is clamped to the boundaries. There is no
//!   gravity.
//! - Dragging: nothing here; the pointer places the pet.
//! - Thrown: gravity (scaled by the thrown multiplier) accelerates the pet,
//!   boundary hits reflect the velocity with energy loss, floor contact also
//!   scales the horizontal velocity by the same factor, and the state ends on
//!   the time cap or once the pet rests on the floor with its whole speed
//!   under the settle threshold.
//!
//! The math lives in free functions so it can be tested without a world.

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::debug;

use crate::components::actionplayer::ActionPlayer;
use crate::components::behaviorstate::{BehaviorState, ReselectReason};
use crate::components::interaction::{Interaction, ThrownState};
use crate::components::pet::{Facing, PetBody, PetId, PetPack};
use crate::resources::environment::{BoundaryRect, Environment};
use crate::resources::petconfig::{PetConfig, ThrownPhysics};
use crate::resources::worldtime::WorldTime;

/// Release velocity before and after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowVelocity {
    /// Speed before clamping, compared against the throw threshold.
    pub raw_speed: f32,
    /// Velocity clamped to the maximum throw speed, px/s.
    pub velocity: Vec2,
}

/// Velocity of a drag that moved `displacement` pixels in `elapsed` seconds.
///
/// A drag with no measurable duration (or a bogus timestamp) uses
/// `displacement * fallback_multiplier` instead of dividing by zero.
pub fn compute_throw_velocity(displacement: Vec2, elapsed: f64, params: &ThrownPhysics) -> ThrowVelocity {
    let timed = (elapsed > 0.0 && elapsed.is_finite())
        .then(|| displacement / elapsed as f32 * params.time_multiplier)
        .filter(|v| v.is_finite());
    let raw = timed.unwrap_or(displacement * params.fallback_multiplier);
    let raw = if raw.is_finite() { raw } else { Vec2::ZERO };
    ThrowVelocity {
        raw_speed: raw.length(),
        velocity: raw.clamp_length_max(params.max_velocity.max(0.0)),
    }
}

/// Pixels moved this tick by a frame velocity authored in px/tick.
pub fn move_displacement(frame_velocity: Vec2, facing: Facing, dt: f32, tick_rate: f32) -> Vec2 {
    facing.orient(frame_velocity) * dt * tick_rate
}

/// Outcome of one thrown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrownOutcome {
    Flying,
    /// Came to rest on the floor.
    Settled,
    /// Reached the time cap.
    TimedOut,
}

/// Advance a thrown pet by `dt` seconds.
pub fn thrown_step(
    body: &mut PetBody,
    state: &mut ThrownState,
    bounds: &BoundaryRect,
    params: &ThrownPhysics,
    gravity: f32,
    dt: f32,
) -> ThrownOutcome {
    let gravity_step = gravity * params.gravity_multiplier * dt;
    body.velocity.y += gravity_step;
    body.position += body.velocity * dt;
    state.timer += dt;

    let loss = params.bounce_energy_loss;
    let mut landed = false;
    if body.position.x < bounds.left_wall {
        body.position.x = bounds.left_wall;
        body.velocity.x = body.velocity.x.abs() * loss;
    }
    if body.position.x + body.size.x > bounds.right_wall {
        body.position.x = bounds.right_wall - body.size.x;
        body.velocity.x = -body.velocity.x.abs() * loss;
    }
    if body.position.y < bounds.ceiling {
        body.position.y = bounds.ceiling;
        body.velocity.y = body.velocity.y.abs() * loss;
    }
    if body.position.y + body.size.y >= bounds.floor {
        body.position.y = bounds.floor - body.size.y;
        landed = true;
        let rebound = body.velocity.y.abs() * loss;
        // A bounce weaker than one tick of gravity is a landing.
        body.velocity.y = if rebound <= gravity_step.abs() { 0.0 } else { -rebound };
        body.velocity.x *= loss;
    }
    body.position = bounds.clamp_rect(body.position, body.size);

    if state.timer >= params.throw_duration {
        ThrownOutcome::TimedOut
    } else if landed && body.velocity.length() < params.settle_velocity {
        ThrownOutcome::Settled
    } else {
        ThrownOutcome::Flying
    }
}

/// Integrate motion for every pet according to its interaction mode.
pub fn physics_step(
    time: Res<WorldTime>,
    env: Res<Environment>,
    config: Res<PetConfig>,
    mut pets: Query<(
        &PetId,
        &PetPack,
        &ActionPlayer,
        &mut PetBody,
        &mut Facing,
        &mut Interaction,
        &mut BehaviorState,
    )>,
) {
    let dt = time.delta;
    let bounds = env.bounds;
    for (id, pack, player, mut body, mut facing, mut interaction, mut state) in pets.iter_mut() {
        let mode = *interaction;
        match mode {
            Interaction::Idle => {
                let frame_velocity = player.frame_velocity(&pack.0);
                let delta = move_displacement(frame_velocity, *facing, dt, config.tick_rate);
                let target = body.position + delta;
                let clamped = bounds.clamp_rect(target, body.size);
                if delta.x < 0.0 && clamped.x > target.x {
                    facing.set_if_neq(Facing::Right);
                } else if delta.x > 0.0 && clamped.x < target.x {
                    facing.set_if_neq(Facing::Left);
                }
                body.velocity = if dt > 0.0 { (clamped - body.position) / dt } else { Vec2::ZERO };
                body.position = clamped;
            }
            Interaction::Dragging(_) => {}
            Interaction::Thrown(mut thrown) => {
                let outcome = thrown_step(
                    &mut body,
                    &mut thrown,
                    &bounds,
                    &config.thrown,
                    config.gravity,
                    dt,
                );
                if let Some(f) = Facing::from_dx(body.velocity.x) {
                    facing.set_if_neq(f);
                }
                if outcome == ThrownOutcome::Flying {
                    *interaction = Interaction::Thrown(thrown);
                } else {
                    interaction.transition(Interaction::Idle);
                    body.velocity = Vec2::ZERO;
                    state.request(ReselectReason::Interaction);
                    debug!("{}: thrown state ended ({:?})", id.0, outcome);
                }
            }
        }
    }
}
