#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use cluster_policy_core as core;
pub use cluster_policy_k8s as k8s;

mod args;
pub mod config;
pub mod defaults;

pub use self::args::{exit_code, Args};
