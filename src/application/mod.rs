pub mod accounts;
pub mod dashboard;
pub mod data_refresh;
pub mod sync_engine;

pub use accounts::AccountManager;
pub use dashboard::load_dashboard;
pub use data_refresh::{refresh_dashboard, RefreshResult};
pub use sync_engine::{Origin, Session, SyncEngine, Synced};
