pub mod accounts;
pub mod api;
pub mod assistant;
pub mod auth;
pub mod config;
pub mod content;
pub mod leaderboard;
pub mod localize;
pub mod media;
pub mod models;
pub mod notifications;
pub mod payments;
pub mod social;
pub mod store;
pub mod telemetry;
pub mod utils;
