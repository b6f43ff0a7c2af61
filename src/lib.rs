pub mod calibrate;
pub mod channels;
pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod decode;
pub mod engine;
pub mod error;
pub mod frame;
pub mod humanize;
pub mod locate;
pub mod registry;
pub mod replay;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
