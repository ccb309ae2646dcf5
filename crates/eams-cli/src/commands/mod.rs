pub mod enroll;
pub mod init;
pub mod query;
pub mod rob;
