pub mod cli;
pub mod cycle;
pub mod poll;
pub mod sftp;
