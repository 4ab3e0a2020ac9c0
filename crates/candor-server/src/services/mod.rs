//! Business logic services

pub mod auth;
pub mod feedback_manager;
pub mod user_directory;

pub use auth::AuthService;
pub use feedback_manager::FeedbackManager;
pub use user_directory::UserDirectory;
