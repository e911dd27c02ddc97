//! Credentials, bearer tokens and the role gate.

mod extract;
mod gate;
mod password;
mod token;

pub use extract::CurrentUser;
pub use gate::{authorize, Identity, Operation};
pub use password::{hash_password, verify_password};
pub use token::TokenIssuer;
