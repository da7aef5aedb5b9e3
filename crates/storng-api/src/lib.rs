//! Remote side of storng: route descriptors, the injected fetch transport,
//! and the [`RemoteGateway`] that authenticates private calls and
//! coordinates access-token refreshes.

pub mod error;
pub mod gateway;
pub mod response;
pub mod route;
pub mod token;
pub mod transport;

pub use error::Error;
pub use gateway::{DEFAULT_REFRESH_LOOKAHEAD, RefreshState, RemoteGateway};
pub use response::Response;
pub use route::{Method, RequestInit, Route};
pub use token::{StaticToken, TokenProvider};
pub use transport::{Fetch, HttpFetch, TlsMode, TransportConfig};
