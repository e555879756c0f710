pub mod db;
mod events;
pub mod models;
mod reactions;
mod tables;
mod uploads;

pub use db::{Database, DatabaseError};
pub use tables::*;
