pub mod lead;
pub mod message;
