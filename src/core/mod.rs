pub mod credential;
pub mod credential_format;
pub mod error;
pub mod jwt;
pub mod offer;
pub mod proof;
pub mod token;
pub mod util;
pub mod version;
