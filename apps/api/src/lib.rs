pub mod bootstrap;
pub mod realtime;
pub mod router;

pub use bootstrap::{build_state, build_store};
pub use router::create_router;
