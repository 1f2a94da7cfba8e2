pub mod executor;
pub mod history;
pub mod payload;
pub mod poll;
pub mod view;
