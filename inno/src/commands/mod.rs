pub mod info;
pub mod probe;
