pub use client::*;

mod client;
