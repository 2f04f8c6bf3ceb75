pub mod password;
pub mod secret;
pub mod token;
