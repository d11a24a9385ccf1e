//! Login-session identity, scope normalization, token secrets, and verified ID token claims.

pub mod id;
pub mod id_token;
pub mod scope;
pub mod secret;
pub mod session;

pub use id::*;
pub use id_token::*;
pub use scope::*;
pub use secret::*;
pub use session::*;
