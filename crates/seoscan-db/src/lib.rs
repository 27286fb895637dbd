pub mod config;
pub mod database;
pub mod frontier_repository;
pub mod job_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use frontier_repository::FrontierRepository;
pub use job_repository::CrawlJobRepository;
