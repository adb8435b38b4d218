pub mod manager;
pub mod user_info;

pub use manager::{DatabaseError, DatabaseManager};
pub use user_info::{PgUserInfoStore, UserInfoError, UserInfoStore};
