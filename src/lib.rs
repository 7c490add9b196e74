pub mod audit;
pub mod auth;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod templates_structs;
pub mod uploads;
