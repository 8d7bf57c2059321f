// Internal types shared between stores and services
pub mod auth;
pub mod lockout;
pub mod rbac;
pub mod user;
