use crate::{config::LandscapeConfig, landscape::Landscape, notify::LandscapeChange, tile::Tile};
use async_channel::Receiver;
use bevy::prelude::*;

/// The receiving end of the change channel of the [`Landscape`] resource.
#[derive(Resource)]
struct LandscapeChanges(Receiver<LandscapeChange>);

/// Inserts the [`Landscape`] resource and forwards its changes as [`LandscapeChange`] events.
pub struct LandscapePlugin {
    pub config: LandscapeConfig,
}

impl Plugin for LandscapePlugin {
    fn build(&self, app: &mut App) {
        let (sender, receiver) = async_channel::unbounded();

        let landscape = match Landscape::new(self.config.clone()) {
            Ok(landscape) => landscape.with_listener(sender),
            Err(error) => {
                error!("Failed to create the landscape: {error}");
                return;
            }
        };

        app.add_event::<LandscapeChange>()
            .insert_resource(landscape)
            .insert_resource(LandscapeChanges(receiver))
            .add_systems(
                Last,
                (retry_pending_collision, forward_landscape_changes).chain(),
            );
    }
}

fn retry_pending_collision(mut landscape: ResMut<Landscape>) {
    if landscape.tiles().any(Tile::has_pending_collision) {
        landscape.retry_pending_collision();
    }
}

fn forward_landscape_changes(
    changes: Res<LandscapeChanges>,
    mut events: EventWriter<LandscapeChange>,
) {
    events.send_batch(std::iter::from_fn(|| changes.0.try_recv().ok()));
}
