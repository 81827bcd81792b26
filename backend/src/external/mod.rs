//! Collaborators outside the database

pub mod storage;

pub use storage::{FileStorage, StorageDir};
