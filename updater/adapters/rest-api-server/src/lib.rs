pub use server::*;

mod pages;
mod server;
mod session;
