mod database {
    pub mod actions;
    pub mod error;
    pub mod import;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod ingredients;
    pub mod query;
    pub mod recipes;
    pub mod router;
    pub mod tags;
    pub mod users;
}
mod constants;
mod media;

pub use api::router::routes;
pub use api::*;
pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use media::{media_url, parse_data_uri, remove_media, store_image};
