mod health;
mod url;

pub use health::{health_handler, ping_handler};
pub use url::{
    create_batch_handler, create_json_handler, create_text_handler, delete_user_urls_handler,
    list_user_urls_handler, resolve_handler, stats_handler,
};
