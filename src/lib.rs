//! Sponsored-content placement: campaign metadata, ad-slot eligibility,
//! archiveless listings and tracking pixels.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
