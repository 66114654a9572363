use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Self-declared plugin description, fetched from
/// `<available>/<pluginId>/manifest.json`. Only built through
/// [`crate::plugin::validate::parse_manifest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub plugin_id: String,
    pub version: String,
    pub description: String,
    pub author: String,
    /// Entry module, used as a lookup key into the module table.
    pub main: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_points: Option<ExtensionPoints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionPoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteExtension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawer: Option<Vec<DrawerExtension>>,
    #[serde(rename = "RA1", default, skip_serializing_if = "Option::is_none")]
    pub ra1: Option<Vec<RouteExtension>>,
    #[serde(rename = "RA2", default, skip_serializing_if = "Option::is_none")]
    pub ra2: Option<Vec<RouteExtension>>,
    #[serde(rename = "RU1", default, skip_serializing_if = "Option::is_none")]
    pub ru1: Option<Vec<RouteExtension>>,
    #[serde(rename = "RU2", default, skip_serializing_if = "Option::is_none")]
    pub ru2: Option<Vec<RouteExtension>>,
    #[serde(rename = "DA1", default, skip_serializing_if = "Option::is_none")]
    pub da1: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DA2", default, skip_serializing_if = "Option::is_none")]
    pub da2: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DU1", default, skip_serializing_if = "Option::is_none")]
    pub du1: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DU2", default, skip_serializing_if = "Option::is_none")]
    pub du2: Option<Vec<DrawerExtension>>,
    #[serde(rename = "G1", default, skip_serializing_if = "Option::is_none")]
    pub g1: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G2", default, skip_serializing_if = "Option::is_none")]
    pub g2: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G3", default, skip_serializing_if = "Option::is_none")]
    pub g3: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G4", default, skip_serializing_if = "Option::is_none")]
    pub g4: Option<Vec<InjectorExtension>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteExtension {
    #[serde(default)]
    pub plugin_id: String,
    pub path: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawerExtension {
    #[serde(default)]
    pub plugin_id: String,
    pub label: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_order",
        skip_serializing_if = "Option::is_none"
    )]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectorExtension {
    #[serde(default)]
    pub plugin_id: String,
    pub injector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_order",
        skip_serializing_if = "Option::is_none"
    )]
    pub order: Option<i64>,
}

/// Reads an `order` value: integers, integral floats and integer strings.
/// `null` means unordered.
pub fn order_from_json(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| format!("order {n} is not an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("order {s:?} is not an integer")),
        other => Err(format!("order must be an integer, got {other}")),
    }
}

fn lenient_order<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    order_from_json(&value).map_err(serde::de::Error::custom)
}

/// Named slot a plugin can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionPointType {
    Routes,
    Drawer,
    Ra1,
    Ra2,
    Ru1,
    Ru2,
    Da1,
    Da2,
    Du1,
    Du2,
    G1,
    G2,
    G3,
    G4,
}

impl ExtensionPointType {
    pub const ALL: [ExtensionPointType; 14] = [
        Self::Routes,
        Self::Drawer,
        Self::Ra1,
        Self::Ra2,
        Self::Ru1,
        Self::Ru2,
        Self::Da1,
        Self::Da2,
        Self::Du1,
        Self::Du2,
        Self::G1,
        Self::G2,
        Self::G3,
        Self::G4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Routes => "routes",
            Self::Drawer => "drawer",
            Self::Ra1 => "RA1",
            Self::Ra2 => "RA2",
            Self::Ru1 => "RU1",
            Self::Ru2 => "RU2",
            Self::Da1 => "DA1",
            Self::Da2 => "DA2",
            Self::Du1 => "DU1",
            Self::Du2 => "DU2",
            Self::G1 => "G1",
            Self::G2 => "G2",
            Self::G3 => "G3",
            Self::G4 => "G4",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn is_drawer(self) -> bool {
        matches!(
            self,
            Self::Drawer | Self::Da1 | Self::Da2 | Self::Du1 | Self::Du2
        )
    }
}

/// One registered contribution, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    Route(RouteExtension),
    Drawer(DrawerExtension),
    Injector(InjectorExtension),
}

impl Extension {
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::Route(route) => &route.plugin_id,
            Self::Drawer(item) => &item.plugin_id,
            Self::Injector(injector) => &injector.plugin_id,
        }
    }

    pub fn with_plugin_id(mut self, plugin_id: &str) -> Self {
        let slot = match &mut self {
            Self::Route(route) => &mut route.plugin_id,
            Self::Drawer(item) => &mut item.plugin_id,
            Self::Injector(injector) => &mut injector.plugin_id,
        };
        *slot = plugin_id.to_string();
        self
    }
}

impl ExtensionPoints {
    /// Every declared entry with the slot it was declared under, in
    /// declaration order.
    pub fn entries(&self) -> Vec<(ExtensionPointType, Extension)> {
        fn push<T: Clone>(
            out: &mut Vec<(ExtensionPointType, Extension)>,
            kind: ExtensionPointType,
            items: &Option<Vec<T>>,
            wrap: fn(T) -> Extension,
        ) {
            for item in items.iter().flatten() {
                out.push((kind, wrap(item.clone())));
            }
        }

        use ExtensionPointType as K;
        let mut out = Vec::new();
        push(&mut out, K::Routes, &self.routes, Extension::Route);
        push(&mut out, K::Drawer, &self.drawer, Extension::Drawer);
        push(&mut out, K::Ra1, &self.ra1, Extension::Route);
        push(&mut out, K::Ra2, &self.ra2, Extension::Route);
        push(&mut out, K::Ru1, &self.ru1, Extension::Route);
        push(&mut out, K::Ru2, &self.ru2, Extension::Route);
        push(&mut out, K::Da1, &self.da1, Extension::Drawer);
        push(&mut out, K::Da2, &self.da2, Extension::Drawer);
        push(&mut out, K::Du1, &self.du1, Extension::Drawer);
        push(&mut out, K::Du2, &self.du2, Extension::Drawer);
        push(&mut out, K::G1, &self.g1, Extension::Injector);
        push(&mut out, K::G2, &self.g2, Extension::Injector);
        push(&mut out, K::G3, &self.g3, Extension::Injector);
        push(&mut out, K::G4, &self.g4, Extension::Injector);
        out
    }
}
