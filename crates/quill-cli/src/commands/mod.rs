//! Command handlers

pub mod article;
pub mod config;
pub mod page;
pub mod run;
pub mod serie;
pub mod status;
pub mod tag;
