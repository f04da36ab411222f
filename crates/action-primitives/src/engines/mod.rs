mod fetch;
mod scripted;

pub use fetch::FetchEngine;
pub use scripted::ScriptedEngine;
