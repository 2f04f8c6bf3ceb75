pub mod auth;
pub mod notification;
pub mod profile;
pub mod request;
