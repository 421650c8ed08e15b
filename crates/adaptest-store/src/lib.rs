//! adaptest-store: file-backed collaborators for the CAT engine.
//!
//! TOML item banks, a JSON-file session store and `adaptest.toml`
//! configuration loading.

pub mod bank_file;
pub mod config;
pub mod error;
pub mod json_store;

pub use adaptest_core::memory::MemoryItemBank;
pub use bank_file::{load_bank, parse_bank, parse_bank_str, validate_bank, ItemBankFile};
pub use config::{load_config, load_config_from, AdaptestConfig};
pub use error::StoreError;
pub use json_store::JsonFileSessionStore;
