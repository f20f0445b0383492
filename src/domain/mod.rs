pub mod capability;
pub mod fee;
pub mod status;
