//! Backend of an AI math tutor for school children.
//!
//! Students sign up, ask questions (typed or photographed) and get a
//! step-by-step explanation from a generative model, kept as conversation
//! history. The [`render`] module draws the explanation's arithmetic on a
//! chalkboard PNG.

pub mod auth;
pub mod config;
pub mod errors;
pub mod net;
pub mod render;
pub mod server;
pub mod store;
pub mod tutor;
