pub mod creator;
pub mod user_preferences;

pub use creator::Creator;
pub use user_preferences::UserPreferences;
