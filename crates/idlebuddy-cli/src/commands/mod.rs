pub mod battle;
pub mod buddy;
pub mod config;
pub mod ddl;
pub mod economy;
pub mod focus;
pub mod sim;
pub mod status;
