// Library interface for techpulse modules
// This allows tests and the binary to import modules

pub mod app;
pub mod bookmarks;
pub mod console;
pub mod news;
pub mod opener;
pub mod surface;
