//! Request/response primitives and the outbound HTTP client.

mod client;
mod cookie;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use cookie::{Cookie, CookieSettings, DiscardingCookie, SameSite};
pub use request::IncomingRequest;
pub use response::OutgoingResponse;
