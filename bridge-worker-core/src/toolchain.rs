//! Opaque format-family and delivery-subtype tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A blanket `impl<S: Into<String>> From<S> for $ty` conflicts with the
/// stdlib's reflexive `impl<T> From<T> for T`: the compiler can't rule out
/// a downstream `impl From<$ty> for String`, so it must assume `$ty:
/// Into<String>` might hold and rejects the blanket impl as overlapping
/// (E0119). `String` and `&str` are the only two source types actually
/// constructed anywhere in this workspace, so two concrete impls cover it.
macro_rules! impl_from_str_like {
    ($ty:ident) => {
        impl From<String> for $ty {
            fn from(s: String) -> Self {
                $ty(s)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                $ty(s.to_string())
            }
        }
    };
}

/// A configuration format family, e.g. `"Kubernetes/YAML"` or
/// `"OpenTofu/HCL"`. Opaque to the core: it is only ever compared for
/// equality and used as a map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Toolchain(pub String);

impl Toolchain {
    /// Borrow the underlying tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl_from_str_like!(Toolchain);

/// A delivery subtype within a toolchain, e.g. `"FluxOCIWriter"` or
/// `"ConfigMap"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(pub String);

impl Provider {
    /// Borrow the underlying tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl_from_str_like!(Provider);

/// Identifies a handler slot in the dispatcher: toolchain plus provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub toolchain: Toolchain,
    pub provider: Provider,
}

impl HandlerKey {
    #[must_use]
    pub fn new(toolchain: impl Into<Toolchain>, provider: impl Into<Provider>) -> Self {
        Self {
            toolchain: toolchain.into(),
            provider: provider.into(),
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.toolchain, self.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_displays_as_its_tag() {
        let t = Toolchain::from("Kubernetes/YAML");
        assert_eq!(t.to_string(), "Kubernetes/YAML");
        assert_eq!(t.as_str(), "Kubernetes/YAML");
    }

    #[test]
    fn handler_key_equality_ignores_nothing() {
        let a = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        let b = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        let c = HandlerKey::new("Kubernetes/YAML", "ConfigMap");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
