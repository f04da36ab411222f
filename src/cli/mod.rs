pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod engines;
pub mod env;
pub mod goal;
pub mod output;
pub mod plan;
pub mod run;
pub mod runtime;

pub use app::run;
