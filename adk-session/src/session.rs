use adk_core::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

pub trait Session: Send + Sync {
    fn id(&self) -> &str;
    fn app_name(&self) -> &str;
    fn user_id(&self) -> &str;
    fn state(&self) -> &HashMap<String, Value>;
    fn events(&self) -> &[Event];
    fn last_update_time(&self) -> DateTime<Utc>;
}
