use chrono::Local;
use uuid::Uuid;

/// Format: run-{YYYYMMDDHHmmss}-{random8}
pub fn generate_run_id() -> String {
    let ts = Local::now().format("%Y%m%d%H%M%S");
    let uuid = Uuid::new_v4().simple().to_string();
    let suffix = &uuid[..8];
    format!("run-{}-{}", ts, suffix)
}
