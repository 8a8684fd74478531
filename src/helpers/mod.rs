pub mod csv_loader;
pub mod login;
pub mod network;
pub mod schema;
pub mod template;
pub mod week;
