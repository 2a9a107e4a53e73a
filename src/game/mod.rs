//! Game simulation modules

pub mod collision;
pub mod combo;
pub mod damage;
pub mod fighter;
pub mod frame_data;
pub mod r#match;
pub mod physics;
pub mod session;
pub mod snapshot;

pub use r#match::{MatchConfig, MatchConfigError, MatchState};
pub use session::{MatchRegistry, NoRatings, RatingCollaborator, SessionError};
