use uuid::Uuid;

pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

/// Generates unique client order ids of the form `<prefix>-<uuid>`.
///
/// The prefix is reduced to the exchange's allowed characters and trimmed so
/// the full id stays within [`MAX_CLIENT_ORDER_ID_LEN`].
#[derive(Debug, Clone)]
pub struct ClientOrderIds {
    prefix: String,
}

impl ClientOrderIds {
    pub fn new(prefix: &str) -> Self {
        // 32 hex chars for the uuid plus the separator
        let room = MAX_CLIENT_ORDER_ID_LEN - 33;
        let prefix = prefix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '/' | '_'))
            .take(room)
            .collect();
        Self { prefix }
    }

    pub fn next_id(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        if self.prefix.is_empty() {
            id
        } else {
            format!("{}-{}", self.prefix, id)
        }
    }
}
