pub mod common;
pub mod lesson;
pub mod statistics;
pub mod student;
pub mod user;

pub use common::*;
pub use lesson::*;
pub use statistics::*;
pub use student::*;
pub use user::*;
