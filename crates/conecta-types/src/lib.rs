pub mod api;
pub mod completion;
pub mod events;
pub mod models;
pub mod workflow;
