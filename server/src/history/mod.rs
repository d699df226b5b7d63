pub mod export;
pub mod history;
pub mod migrations;
pub mod sqlite_history;
