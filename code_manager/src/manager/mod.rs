pub mod manager;
pub mod queue;
