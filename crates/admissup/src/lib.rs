//! Gestion des inscriptions administratives après Parcoursup.
//!
//! The library side of the service: normalization of admission payloads
//! coming from the Parcoursup API (push, pull, or CSV export), the
//! candidate/voeu registry, the fiche (dossier section) lifecycle engine,
//! and the mailing batch. HTTP serving lives in `services/api`.

// Gateway traits use native `async fn` (stable since Rust 1.75); callers go
// through generics, never trait objects, so the advisory lint is moot.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
