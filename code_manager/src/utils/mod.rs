pub mod config_management;
