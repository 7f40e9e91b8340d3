//! Client for the SkillsView analysis backend.
//!
//! Covers the endpoints the upload flow and the results view depend on:
//! multipart upload, status polling, details, listing, downloads, and the
//! profile lookup that carries the subscription quota. Requests carry a
//! bearer token that is refreshed once on `401`.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod upload;

pub use api::AnalysisApi;
pub use auth::{TokenStore, Tokens};
pub use client::{HttpAnalysisClient, ListQuery};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use upload::VideoUpload;
