pub mod logging;
pub mod plate_database;
pub mod util;
