//! Backend HTTP access.
//!
//! [`ApiClient`] is the only component that talks to the network. The
//! services in this module are thin typed wrappers around it.

mod client;
mod envelope;
mod error;
mod profile;
mod stations;

pub use client::{ApiClient, ApiRequest, ApiResponse, SessionHooks};
pub use envelope::{decode_payload, Envelope, MaybeEnveloped, MessageResponse};
pub use error::ApiError;
pub use profile::{ProfileService, ProfileUpdate, ProfileUpdateResponse};
pub use stations::StationService;
