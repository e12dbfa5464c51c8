pub mod app;
mod view;

pub use app::JukeboxApp;
