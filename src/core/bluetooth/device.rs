//! Device name matching

/// Decides whether an advertised name belongs to the device we are looking for.
/// Matching is a case-insensitive substring test; devices without a name never match.
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    target: String,
}

impl DeviceMatcher {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_lowercase(),
        }
    }

    /// Returns true if `name` contains the target
    pub fn matches(&self, name: Option<&str>) -> bool {
        name.map(|name| name.to_lowercase().contains(&self.target))
            .unwrap_or(false)
    }
}
