// Library interface for textapi modules
// This allows tests and the binary to import modules

pub mod llm;
pub mod server;
