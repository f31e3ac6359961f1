//! The session layer: a settings store per repository, the transport it
//! talks through, the events it emits and the summary cache they invalidate.

pub mod commands;
pub mod events;
pub mod helpers;
pub mod proxy;
pub mod state;
pub mod store;
pub mod summary_cache;
pub mod transport;

pub use events::StoreEvent;
pub use proxy::EventProxy;
pub use state::StorePhase;
pub use store::FilterSettingsStore;
pub use summary_cache::{InvalidatingProxy, SummaryCache};
pub use transport::{HttpTransport, RepositoryTransport, SettingsTransport};
