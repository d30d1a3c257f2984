pub mod dns;
pub mod web;

pub use dns::spawn_listeners;
