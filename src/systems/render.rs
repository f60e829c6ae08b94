//! Render descriptor publication.
//!
//! The engine draws nothing itself. At the end of every tick
//! [`publish_render_frames`] refreshes each pet's [`RenderDescriptor`] with
//! the image, anchor, flip and rectangle the host should draw.

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::components::actionplayer::ActionPlayer;
use crate::components::pet::{Facing, PetBody, PetId, PetPack};
use crate::components::renderframe::RenderDescriptor;

/// Anchor of a left-facing frame as seen once the sprite is mirrored.
pub fn oriented_anchor(anchor: Vec2, frame_width: f32, facing: Facing) -> Vec2 {
    match facing {
        Facing::Left => anchor,
        Facing::Right => Vec2::new(frame_width - anchor.x, anchor.y),
    }
}

/// Copy the current frame and body state into each pet's descriptor.
///
/// While no block applies the previous image is kept, so the host never
/// blanks a pet between blocks.
pub fn publish_render_frames(
    mut pets: Query<(
        &PetId,
        &PetPack,
        &ActionPlayer,
        &PetBody,
        &Facing,
        &mut RenderDescriptor,
    )>,
) {
    for (id, pack, player, body, facing, mut descriptor) in pets.iter_mut() {
        let mut next = descriptor.clone();
        next.pet = id.0;
        if let Some(frame) = player.current_frame(&pack.0) {
            if frame.image.is_some() {
                next.image = frame.image.clone();
            }
            next.anchor = oriented_anchor(frame.anchor, body.size.x, *facing);
        }
        next.flip_horizontal = *facing == Facing::Right;
        next.position = body.position;
        next.size = body.size;
        descriptor.set_if_neq(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::pet::PetHandle;
    use crate::resources::catalogstore::fixtures::*;
    use crate::resources::catalogstore::{ActionKind, PackCatalog};
    use std::sync::Arc;

    #[test]
    fn test_anchor_mirrors_when_facing_right() {
        let a = Vec2::new(20.0, 128.0);
        assert_eq!(oriented_anchor(a, 128.0, Facing::Left), a);
        assert_eq!(oriented_anchor(a, 128.0, Facing::Right), Vec2::new(108.0, 128.0));
    }

    #[test]
    fn test_descriptor_follows_pet() {
        let pack = Arc::new(PackCatalog::new(
            "test",
            vec![action("Stand", ActionKind::Stay, vec![frame("stand.png", 0.1)])],
            vec![behavior("Stand", 1, 0)],
            0,
        ));
        let mut player = ActionPlayer::default();
        player.start(0, &pack);
        let mut world = World::new();
        let pet = world
            .spawn((
                PetId(PetHandle(9)),
                PetPack(pack.clone()),
                player,
                PetBody::new(Vec2::new(10.0, 20.0), Vec2::new(128.0, 128.0)),
                Facing::Right,
                RenderDescriptor {
                    pet: PetHandle(9),
                    image: None,
                    anchor: Vec2::ZERO,
                    flip_horizontal: false,
                    position: Vec2::ZERO,
                    size: Vec2::ZERO,
                },
            ))
            .id();

        // Select a block so a frame is current.
        {
            let mut player = world.get_mut::<ActionPlayer>(pet).unwrap();
            let mut events = Default::default();
            player.advance(&pack, 0.0, |_| true, &mut events);
        }

        let mut schedule = Schedule::default();
        schedule.add_systems(publish_render_frames);
        schedule.run(&mut world);

        let d = world.get::<RenderDescriptor>(pet).unwrap();
        assert_eq!(d.image.as_deref(), Some("stand.png"));
        assert!(d.flip_horizontal);
        assert_eq!(d.anchor, Vec2::new(64.0, 128.0));
        assert_eq!(d.position, Vec2::new(10.0, 20.0));
        assert_eq!(d.size, Vec2::new(128.0, 128.0));
    }
}
