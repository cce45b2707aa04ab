use uuid::Uuid;

/// Number of hex characters taken from a random v4 uuid.
const ID_SUFFIX_LEN: usize = 8;

/// Builds a new record id of the form `<prefix>-<8 hex chars>`.
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..ID_SUFFIX_LEN])
}
