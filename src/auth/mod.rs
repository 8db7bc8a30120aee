/// Authentication module
///
/// Password hashing, token creation/verification, the revocation cache
/// and the request gate built on top of them.

mod claims;
mod jwt;
mod password;
mod revocation;
mod validator;

pub use claims::{Claims, TokenKind};
pub use jwt::{TokenCodec, TokenCodecs};
pub use password::PasswordHasher;
pub use revocation::RevocationCache;
pub use validator::{extract_bearer, AuthenticatedUser, SessionValidator};
