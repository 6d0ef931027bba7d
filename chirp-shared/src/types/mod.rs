pub mod api;
pub mod auth;
pub mod media;

pub use api::*;
pub use auth::*;
pub use media::*;
