pub mod document;
pub mod search;
pub mod status;
pub mod transfer;
