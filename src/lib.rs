pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod monitor;
pub mod server;

pub mod simulation;
