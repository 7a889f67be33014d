#![forbid(unsafe_code)]

pub mod info;
