pub mod app;
pub mod braille;
pub mod config;
pub mod data;
pub mod events;
pub mod imagery;
pub mod legend;
pub mod map;
pub mod timeline;
pub mod ui;
