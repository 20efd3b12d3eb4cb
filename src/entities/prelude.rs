pub use super::activity_logs::Entity as ActivityLogs;
pub use super::file_tags::Entity as FileTags;
pub use super::stored_objects::Entity as StoredObjects;
pub use super::tags::Entity as Tags;
pub use super::users::Entity as Users;
