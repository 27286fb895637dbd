pub mod common;
mod crawl_tests;
mod frontier_tests;
mod job_queue_tests;
