pub mod signaling;

pub use signaling::CallSignalingService;
