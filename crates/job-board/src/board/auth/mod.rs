//! Bearer-token authentication and credential hashing.

mod password;
mod principal;
mod token;

pub use password::CredentialHasher;
pub use principal::Principal;
pub use token::{Claims, TokenError, TokenIssuer};
