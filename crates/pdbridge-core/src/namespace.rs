//! Per-instance names on the engine's shared message bus.

/// Joins the instantiation id and a port's declared name.
pub const SEPARATOR: &str = "-lv2-";

/// Routed name of `port_name` for the patch with `instantiation_id`.
///
/// Distinct ids never yield equal names for any pair of port names, since
/// the id is a decimal integer terminated by [`SEPARATOR`].
pub fn route(instantiation_id: i32, port_name: &str) -> String {
    format!("{instantiation_id}{SEPARATOR}{port_name}")
}

/// Builds routed names for one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceRouter {
    instantiation_id: i32,
    prefix: String,
}

impl NamespaceRouter {
    pub fn new(instantiation_id: i32) -> Self {
        Self {
            instantiation_id,
            prefix: format!("{instantiation_id}{SEPARATOR}"),
        }
    }

    pub fn instantiation_id(&self) -> i32 {
        self.instantiation_id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn route(&self, port_name: &str) -> String {
        let mut routed = String::with_capacity(self.prefix.len() + port_name.len());
        routed.push_str(&self.prefix);
        routed.push_str(port_name);
        routed
    }

    /// Whether `name` lives in this instance's namespace.
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}
