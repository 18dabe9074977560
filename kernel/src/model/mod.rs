pub mod event;
pub mod id;
pub mod store;
pub mod user;
