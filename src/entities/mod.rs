pub mod prelude;

pub mod activity_logs;
pub mod file_tags;
pub mod stored_objects;
pub mod tags;
pub mod users;
