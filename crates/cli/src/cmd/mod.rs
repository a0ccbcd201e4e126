pub mod labs;
pub mod log;
