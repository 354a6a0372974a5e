//! Discord bot commands.
//!
//! This module contains all available bot commands organized by functionality.

pub mod autotp;
pub mod bind;
pub mod cooldown;
pub mod gungame;
pub mod link;

pub use autotp::{autotp, category, tpmessage};
pub use bind::bind;
pub use cooldown::resetcooldown;
pub use gungame::gungame;
pub use link::{link, linkrole, unlink};
