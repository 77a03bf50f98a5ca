//! Authentication: token persistence, login flows and session state.

mod backend;
mod error;
pub mod persist;
mod secure_store;
mod session;
mod token_store;
mod tokens;

pub use backend::{AppleCredential, AppleFullName, AuthBackend, LoginResult};
pub use error::AuthError;
pub use secure_store::{MemorySecureStore, SecureStore, SqliteSecureStore, StorageError};
pub use session::{AuthSession, SessionSnapshot};
pub use token_store::{TokenStore, TOKEN_KEY};
pub use tokens::TokenPair;
