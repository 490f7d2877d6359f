pub mod permission;
pub mod status;
