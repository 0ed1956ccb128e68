pub mod email;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod schedule;

pub use email::*;
pub use jwt::*;
pub use pagination::*;
pub use password::*;
pub use schedule::*;
