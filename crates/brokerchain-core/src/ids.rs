use uuid::Uuid;

/// Record id: `<prefix>-<uuid v4, hex without dashes>`.
pub fn random_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}
