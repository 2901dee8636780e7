//! HTTP transport over `reqwest`

mod client;

pub use client::{HttpClient, HttpClientBuilder};
