use serde_json::{json, Value};

/// Synthesized resource, keyed by its logical id within the owning stack
#[derive(Clone, Debug)]
pub struct CfnResource {
    pub name: String,
    pub resource: Value,
}

/// Opaque reference to a constructed resource
///
/// Downstream constructs embed `ref_()`/`att()` tokens in their own
/// properties but cannot reach the underlying resource through a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handle {
    logical_id: String,
}

impl Handle {
    pub(crate) fn new(logical_id: &str) -> Self {
        Handle {
            logical_id: logical_id.to_string(),
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn ref_(&self) -> Value {
        json!({ "Ref": self.logical_id })
    }

    pub fn att(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id, attribute] })
    }
}

/// Replace any unwanted character in a logical id
/// with its uppercase-alpha counterpart
pub fn escape_logical_id(name: &str) -> String {
    name.replace('@', "AT")
        .replace('.', "DOT")
        .replace('-', "HYPHEN")
        .replace('_', "UNDRSC")
        .replace(' ', "")
}
