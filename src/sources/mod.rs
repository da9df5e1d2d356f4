pub mod device;
pub mod filesystem;
