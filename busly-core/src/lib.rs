//! Busly Core Library
//!
//! This crate provides the authenticated API access layer of the Busly app:
//!
//! - Token persistence in a secure key/value store
//! - An HTTP client that attaches bearer tokens and recovers from 401s by
//!   refreshing the session and replaying the request once
//! - Session state: login flows, refresh, logout, profile
//! - Typed services for stations and profile endpoints
//! - Station picker helpers (fuzzy search, nearest stations)
//! - Configuration and persisted app state in SQLite

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod models;
pub mod stations;
pub mod trip_search;

// Re-exports for convenience
pub use config::{ApiConfig, Language, Settings};
pub use db::Database;

// Re-export API layer
pub use api::{
    ApiClient, ApiError, ApiRequest, ApiResponse, ProfileService, ProfileUpdate,
    ProfileUpdateResponse, SessionHooks, StationService,
};

// Re-export auth
pub use auth::{
    AppleCredential, AuthError, AuthSession, MemorySecureStore, SecureStore, SessionSnapshot,
    SqliteSecureStore, StorageError, TokenPair, TokenStore,
};

// Re-export models
pub use models::{GeoPoint, Station, User, UserPatch};

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use stations::{fuzzy_search, nearest, NearbyStation};
pub use trip_search::SearchState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
