pub mod api;
pub mod credentials;
pub mod db;
pub mod identity;
pub mod mail;
pub mod mongodb;
pub mod store;
