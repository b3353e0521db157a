pub mod archive;
pub mod credentials;
pub mod decrypt;
pub mod inventory;
pub mod naming;
pub mod paths;
pub mod relocate;
pub mod report;
pub mod settings;
pub mod transfer;
pub mod transport;
