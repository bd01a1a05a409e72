pub mod builder;
pub mod xapp;

pub use builder::XappBuilder;
pub use xapp::Xapp;
