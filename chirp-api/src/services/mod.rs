pub mod medias;
pub mod users;
