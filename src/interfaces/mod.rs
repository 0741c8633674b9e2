pub mod remote;
pub mod scheduler;
