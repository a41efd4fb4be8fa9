//! Service layer
//!
//! The registries the bot layer talks to. Each one reads
//! cache-then-store and writes through the persistence coordinator.

mod account;
mod credential;
mod id_list;

pub use account::AccountService;
pub use credential::CredentialService;
pub use id_list::IdListService;
