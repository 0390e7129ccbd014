pub mod app;
pub mod config;
pub mod error;
pub mod seed;
pub mod supervisor;
pub mod models {
    pub mod slug;
    pub mod tour_validator;
}
pub mod db {
    pub mod convert;
    pub mod find_query;
    pub mod models;
    pub mod pipelines;
    pub mod tour_repository;
}
pub mod query {
    pub mod features;
    pub mod filter;
}
pub mod api {
    pub mod envelope;
    pub mod errors;
    pub mod tours;
    pub mod users;
}
