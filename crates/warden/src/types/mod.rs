mod actor_id;
mod node_id;
mod player_id;
mod record_id;

pub use actor_id::ActorId;
pub use node_id::NodeId;
pub use player_id::PlayerId;
pub use record_id::RecordId;
