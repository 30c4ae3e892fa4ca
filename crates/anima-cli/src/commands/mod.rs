pub mod auth;
pub mod calendar;
pub mod config;
pub mod daemon;
pub mod reminder;
pub mod theme;
