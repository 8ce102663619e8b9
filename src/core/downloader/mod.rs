mod client;

pub use client::{partial_path, Downloader};
