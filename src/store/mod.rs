//! Data store modules for Supabase integration

pub mod records;
pub mod supabase;

pub use records::{PlayerRecord, RecordStore};
pub use supabase::SupabaseClient;
