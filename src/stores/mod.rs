// Stores layer - Data access and repository pattern
pub mod attempt_store;
pub mod one_time_token_store;
pub mod rbac_store;
pub mod refresh_token_store;
pub mod user_store;

pub use attempt_store::AttemptStore;
pub use one_time_token_store::OneTimeTokenStore;
pub use rbac_store::RbacStore;
pub use refresh_token_store::RefreshTokenStore;
pub use user_store::UserStore;
