pub mod ask;
pub mod chat;
pub mod init;
pub mod probe;
pub mod utils;
