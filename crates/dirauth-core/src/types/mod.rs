//! Dirauth data model

mod decision;
mod group;
mod user;

pub use decision::*;
pub use group::*;
pub use user::*;
