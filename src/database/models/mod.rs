pub mod user;

pub use user::{UserCredentials, UserProfile, UserRecord};
