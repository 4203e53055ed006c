pub mod config;
pub mod data_files;
pub mod error;
pub mod hero_meta;
pub mod http_client;
pub mod logging;
pub mod match_history;
pub mod mrapi;
pub mod pipeline;
pub mod records;
pub mod reshape;
pub mod table;
pub mod team_stats;
