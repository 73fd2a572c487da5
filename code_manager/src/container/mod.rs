pub mod container;
pub mod guard;
pub mod monitor;
pub mod output;
pub mod workspace;
