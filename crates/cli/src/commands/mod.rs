pub mod job;
pub mod local;
pub mod run;

