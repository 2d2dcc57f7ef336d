pub mod fetch_service;
pub mod focus_service;
pub mod meeting_cache;
pub mod notification_service;
pub mod response_parser;
