pub mod common;
pub mod instructions;
pub mod key;
pub mod locate;
pub mod position;
pub mod signatures;
