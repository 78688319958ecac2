pub mod activate;
pub mod request;
pub mod status;
pub mod watch;
