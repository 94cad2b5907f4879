//! Database models split into domain-specific modules.

pub mod alert;
pub mod session;
pub mod space;
pub mod user;

pub use alert::*;
pub use session::*;
pub use space::*;
pub use user::*;
