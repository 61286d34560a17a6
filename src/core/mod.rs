pub mod auth;
pub mod kinds;
pub mod resource;
pub mod transport;

pub use crate::domain::model::{Empty, Meta, Resource};
pub use crate::domain::ports::{FullName, ResourceKind, TokenSource};
pub use crate::utils::error::Result;
