pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod realtime;
pub mod rtc_token;
pub mod state;
pub mod test_utils;

pub use state::AppState;
