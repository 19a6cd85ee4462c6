pub mod app;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod page;
pub mod report;
pub mod sanitize;
pub mod scanner;
pub mod store;
pub mod task;
