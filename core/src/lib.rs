pub mod db;
pub mod filter;
pub mod models;
pub mod pagination;
pub mod pipeline;
pub mod service;
