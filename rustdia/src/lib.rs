// src/lib.rs
pub mod config;
pub mod error;

pub mod data {
    pub mod acquisition;
    pub mod dia;
    pub mod handle;
    pub mod meta;
    pub mod raw;
    pub mod utility;
}

pub mod index {
    pub mod frame_group;
    pub mod query;
    pub mod scan_interval;
    pub mod window;
}
