pub mod client;

pub use client::{ApiClient, RefreshPolicy, RequestOptions, ResponseBody, LOGOUT_PATH};
