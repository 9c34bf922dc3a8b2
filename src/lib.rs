pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod geofence;
pub mod location;
pub mod model;
pub mod models;
pub mod presence;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
