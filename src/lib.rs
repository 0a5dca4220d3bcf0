pub mod config;
pub mod estimate;
pub mod feed;
pub mod filelist;
pub mod humanize;
pub mod observability;
pub mod session;
mod writer;
