pub mod message;
pub mod session;

pub use message::ChatMessageService;
pub use session::ChatSessionService;
