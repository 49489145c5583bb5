//! Plugins compiled into the binary.

mod hash_type;
mod ip_info;
mod value_match;

pub use hash_type::HashTypeFactory;
pub use ip_info::IpInfoFactory;
pub use value_match::ValueMatchFactory;

use crate::error::PluginError;
use crate::registry::PluginRegistry;

/// Register every built-in plugin.
pub fn register_builtins(registry: &PluginRegistry) -> Result<(), PluginError> {
    registry.register(IpInfoFactory)?;
    registry.register(HashTypeFactory)?;
    registry.register(ValueMatchFactory)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_idempotently() {
        let registry = PluginRegistry::new();
        register_builtins(&registry).unwrap();
        register_builtins(&registry).unwrap();

        let names: Vec<_> = registry.list_all().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["hash_type", "ip_info", "value_match"]);
    }
}
