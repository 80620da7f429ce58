//! hookchat core library: chatbot store, chat proxy, and gateway server
//! used by the CLI.

pub mod chatbot;
pub mod config;
pub mod gateway;
pub mod init;
pub mod proxy;
