//! Collision-resistant names for ephemeral resources

use uuid::Uuid;

/// Generate a fresh random name from a 128-bit v4 UUID.
///
/// Rendered as 32 lowercase hex digits with no separators, which is a valid
/// DNS-1123 label and therefore usable as a namespace name.
pub fn new_unique_name() -> String {
    Uuid::new_v4().simple().to_string()
}
