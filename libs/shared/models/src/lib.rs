pub mod appointment;
pub mod audit;
pub mod auth;
pub mod call;
pub mod chat;
pub mod doctor;
pub mod error;
pub mod patient;
pub mod realtime;
pub mod review;
pub mod slot;
pub mod user;

pub use audit::Audit;
pub use auth::{Actor, Role, User};
pub use error::AppError;
pub use slot::SlotTime;
