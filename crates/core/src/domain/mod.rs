pub mod event;
pub mod guest;
