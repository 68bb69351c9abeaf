pub mod refresh;
pub mod service;
pub mod storage;
pub mod token;
pub mod token_store;

pub use refresh::{HttpSessionRefresher, SessionRefresher};
pub use service::AuthService;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use token::{LoginResponse, Principal, RefreshResponse, RegisterResponse};
pub use token_store::TokenStore;
