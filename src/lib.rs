//! Client for a remote image-similarity scoring service: maintains the
//! ordered collection of uploaded images and runs the single, batch and
//! annotated comparison workflows against it.

pub mod models;
pub mod services;
