//! # DarkNet Prefabs
//!
//! Well-known [`DarkNetConfig`]s, by name.

use crate::models::darknet::{DarkNetConfig, darknet19, darknet53};
use crate::prefabs::{PreFabConfig, StaticPreFabConfig, StaticPreFabMap};

/// Static builder for [`DarkNetPreFabConfig`].
pub type StaticDarkNetPreFabConfig = StaticPreFabConfig<DarkNetConfig>;

/// A [`DarkNetConfig`] Well-Known Pre-Fab.
pub type DarkNetPreFabConfig = PreFabConfig<DarkNetConfig>;

/// DarkNet-19, 1000 ImageNet classes.
pub static DARKNET19_PREFAB: StaticDarkNetPreFabConfig = StaticDarkNetPreFabConfig {
    name: "darknet19",
    description: "DarkNet-19 backbone with a 1000-class conv head",
    builder: || darknet19(1000, true),
};

/// DarkNet-53, 1000 ImageNet classes.
pub static DARKNET53_PREFAB: StaticDarkNetPreFabConfig = StaticDarkNetPreFabConfig {
    name: "darknet53",
    description: "DarkNet-53 residual backbone with a 1000-class linear head",
    builder: || darknet53(1000, true),
};

/// All DarkNet prefabs.
pub static DARKNET_PREFABS: StaticPreFabMap<DarkNetConfig> = StaticPreFabMap {
    name: "darknet",
    items: &[&DARKNET19_PREFAB, &DARKNET53_PREFAB],
};

/// Look up a DarkNet prefab by name.
pub fn try_lookup_prefab(name: &str) -> Option<&'static StaticDarkNetPreFabConfig> {
    DARKNET_PREFABS.try_lookup(name)
}

/// Look up a DarkNet prefab by name.
///
/// # Panics
///
/// If there is no prefab with that name.
pub fn expect_lookup_prefab(name: &str) -> &'static StaticDarkNetPreFabConfig {
    DARKNET_PREFABS.expect_lookup(name)
}
