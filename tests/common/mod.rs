#![allow(dead_code)]

pub mod builders;
pub mod mocks;
pub mod stores;
pub mod strategies;

pub use builders::*;
pub use mocks::*;
pub use stores::*;
