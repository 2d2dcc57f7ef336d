pub mod meeting;
pub mod session;
