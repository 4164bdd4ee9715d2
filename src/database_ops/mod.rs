pub mod artificial_analysis;
pub mod db;
pub mod models;
