#![no_std]

pub mod api;
pub mod detach;
pub mod env;
pub mod media;
pub mod socket;
pub mod wire;
