pub mod approval;
pub mod asset;
pub mod directory;
pub mod maintenance;
