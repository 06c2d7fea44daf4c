pub mod db;
pub mod files;
pub mod insight_llm;
pub mod mail;

pub use db::DbAdapter;
pub use files::{load_calendar, load_staff_directory};
pub use insight_llm::{OpenAiInsightAdapter, StaticInsightAdapter};
pub use mail::{HttpMailAdapter, LogMailAdapter};
