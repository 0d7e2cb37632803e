pub mod events;
pub mod feedback;
pub mod passages;
pub mod user;
