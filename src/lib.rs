pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod playground;
pub mod registry;
pub mod scroll;
pub mod store;
pub mod stream;
pub mod tabs;
pub mod title;
pub mod types;

#[cfg(feature = "ui")]
pub mod theme;
#[cfg(feature = "ui")]
pub mod ui;
#[cfg(feature = "ui")]
pub mod views;
