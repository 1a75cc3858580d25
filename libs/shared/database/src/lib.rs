pub mod error;
pub mod memory;
pub mod postgrest;
pub mod seed;
pub mod store;
pub mod supabase;

pub use error::DatabaseError;
pub use memory::MemoryStore;
pub use postgrest::SupabaseStore;
pub use seed::{load_seed, SeedData};
pub use store::{AppointmentFilter, CallFilter, ClinicStore, ClinicTx, Mutation};
pub use supabase::SupabaseClient;
