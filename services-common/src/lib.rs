pub mod api;
pub mod cfg;
pub mod utils;

pub type TZ = chrono::Utc;
