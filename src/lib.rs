//! Match lifecycle service: advances matches `open -> live -> expired` on a
//! schedule and exposes operator routes over HTTP.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
