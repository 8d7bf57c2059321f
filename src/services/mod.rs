// Services layer - Business logic and orchestration
pub mod auth_service;
pub mod crypto;
pub mod lockout_service;
pub mod rbac;
pub mod token_service;
pub mod user_service;
pub mod validation;

pub use auth_service::AuthService;
pub use lockout_service::LockoutService;
pub use token_service::TokenService;
pub use user_service::UserService;
