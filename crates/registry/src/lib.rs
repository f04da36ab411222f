pub mod dispatch;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod model;
pub mod sessions;
pub mod state;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use errors::RegistryError;
pub use health::EngineHealth;
pub use model::{CleanupReport, LifeState, SessionInfo};
pub use sessions::SessionManager;
pub use state::EngineRegistry;
