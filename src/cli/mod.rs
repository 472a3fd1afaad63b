pub mod config_cmd;
pub mod dashboard_cmd;
pub mod output;
pub mod renderer;
