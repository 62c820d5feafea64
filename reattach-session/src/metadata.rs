//! Schema-resource metadata resolution.
//!
//! Some persistence backends load their schema from external resources
//! shipped alongside the context implementation. Given a context type
//! name and the set of available resource identifiers, a resolver builds
//! the combined locator string handed to the factory.

/// Resolves the metadata locator for a context type.
pub trait MetadataResolver {
    fn metadata_locator(&self, context_name: &str, resource_names: &[String]) -> String;
}

/// Default resolver: picks the schema resources that mention the context
/// type name and carry a known schema suffix (`csdl`, `ssdl`, `.msl`),
/// joining them as `res://*/<name>` separated by `|`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceMetadataResolver;

impl MetadataResolver for ResourceMetadataResolver {
    fn metadata_locator(&self, context_name: &str, resource_names: &[String]) -> String {
        let mut locator = String::new();

        for name in resource_names {
            if name.len() <= 3 || !name.contains(context_name) {
                continue;
            }
            let schema_resource =
                name.ends_with("csdl") || name.ends_with("ssdl") || name.ends_with(".msl");
            if !schema_resource {
                continue;
            }

            if !locator.is_empty() {
                locator.push('|');
            }
            locator.push_str("res://*/");
            locator.push_str(name);
        }

        locator
    }
}
