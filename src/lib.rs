pub mod attachments;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod models;
pub mod sync;

pub mod export {
  pub mod csv;
}

pub mod files {
  pub mod backup;
}
