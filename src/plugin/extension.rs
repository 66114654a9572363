use std::sync::LazyLock;

use regex::Regex;

use crate::plugin::manifest::{DrawerExtension, Extension, PluginManifest, RouteExtension};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Display/grouping slug from the manifest name. Not unique; use
/// `manifest.plugin_id` when identity matters.
pub fn generate_plugin_id(manifest: &PluginManifest) -> String {
    WHITESPACE_RE
        .replace_all(&manifest.name.to_lowercase(), "_")
        .into_owned()
}

/// Stable ascending sort by `order`; items without one go last.
pub fn sort_drawer_items(mut items: Vec<DrawerExtension>) -> Vec<DrawerExtension> {
    items.sort_by_key(|item| (item.order.is_none(), item.order));
    items
}

/// An item that may be hidden from some users.
pub trait PermissionGated {
    fn admin_only(&self) -> bool;
    fn required_permissions(&self) -> &[String];
}

impl PermissionGated for RouteExtension {
    fn admin_only(&self) -> bool {
        self.is_admin
    }

    fn required_permissions(&self) -> &[String] {
        &self.permissions
    }
}

impl PermissionGated for DrawerExtension {
    fn admin_only(&self) -> bool {
        self.is_admin
    }

    fn required_permissions(&self) -> &[String] {
        &self.permissions
    }
}

impl PermissionGated for Extension {
    fn admin_only(&self) -> bool {
        match self {
            Extension::Route(route) => route.admin_only(),
            Extension::Drawer(item) => item.admin_only(),
            Extension::Injector(_) => false,
        }
    }

    fn required_permissions(&self) -> &[String] {
        match self {
            Extension::Route(route) => route.required_permissions(),
            Extension::Drawer(item) => item.required_permissions(),
            Extension::Injector(_) => &[],
        }
    }
}

/// Keeps items the caller may see. The admin check runs first: an admin-only
/// item is dropped for non-admins whatever its permission list says.
pub fn filter_by_permissions<T: PermissionGated>(
    items: impl IntoIterator<Item = T>,
    user_permissions: &[String],
    is_admin: bool,
) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| is_visible(item, user_permissions, is_admin))
        .collect()
}

fn is_visible(item: &impl PermissionGated, user_permissions: &[String], is_admin: bool) -> bool {
    if item.admin_only() && !is_admin {
        return false;
    }

    let required = item.required_permissions();
    required.is_empty() || required.iter().any(|perm| user_permissions.contains(perm))
}
