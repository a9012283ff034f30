//! # Config Prefabs for Well-Known Model Configurations
//!
//! A [`StaticPreFabConfig`] is a `static`-friendly named config builder;
//! a [`PreFabConfig`] is its owned, clonable counterpart.

use burn::config::Config;
use std::fmt::Debug;
use std::sync::Arc;

/// Static builder for a [`PreFabConfig`].
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: &'static str,

    /// Description of the model config pre-fab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Convert to a [`PreFabConfig<C>`].
    pub fn to_prefab(&self) -> PreFabConfig<C> {
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(self.builder),
        }
    }
}

impl<C> From<&StaticPreFabConfig<C>> for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn from(config: &StaticPreFabConfig<C>) -> Self {
        config.to_prefab()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab().fmt(f)
    }
}

/// A [`Config`] Well-Known Pre-Fab.
#[derive(Clone)]
pub struct PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: String,

    /// Description of the model config pre-fab.
    pub description: String,

    /// Builder function for the config.
    pub builder: Arc<dyn Fn() -> C + Send + Sync>,
}

impl<C> Debug for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let type_name = std::any::type_name::<C>();
        let mut handle = f.debug_struct(&format!("PreFabConfig<{type_name}>"));

        handle
            .field("name", &self.name)
            .field("description", &self.description);

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

impl<C> PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Wrap the builder with an edit applied to every built config.
    pub fn map_config<F>(
        &self,
        f: F,
    ) -> Self
    where
        F: Fn(C) -> C + Send + Sync + 'static,
    {
        let builder = self.builder.clone();
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            builder: Arc::new(move || f(builder())),
        }
    }
}

/// A named table of [`StaticPreFabConfig`]s.
pub struct StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the table, used in error messages.
    pub name: &'static str,

    /// The table entries.
    pub items: &'static [&'static StaticPreFabConfig<C>],
}

impl<C> StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// The entry names, in table order.
    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|item| item.name).collect()
    }

    /// Look up an entry by name.
    pub fn try_lookup(
        &self,
        name: &str,
    ) -> Option<&'static StaticPreFabConfig<C>> {
        self.items.iter().copied().find(|item| item.name == name)
    }

    /// Look up an entry by name.
    ///
    /// # Panics
    ///
    /// If no entry has that name; the message lists the known names.
    pub fn expect_lookup(
        &self,
        name: &str,
    ) -> &'static StaticPreFabConfig<C> {
        match self.try_lookup(name) {
            Some(item) => item,
            None => panic!(
                "{} prefab \"{}\" not found; known: {:?}",
                self.name,
                name,
                self.names()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Config, Debug)]
    struct ExampleConfig {
        #[config(default = 3)]
        width: usize,
    }

    static NARROW: StaticPreFabConfig<ExampleConfig> = StaticPreFabConfig {
        name: "narrow",
        description: "A narrow config",
        builder: || ExampleConfig::new().with_width(1),
    };

    static WIDE: StaticPreFabConfig<ExampleConfig> = StaticPreFabConfig {
        name: "wide",
        description: "A wide config",
        builder: || ExampleConfig::new().with_width(100),
    };

    static EXAMPLES: StaticPreFabMap<ExampleConfig> = StaticPreFabMap {
        name: "example",
        items: &[&NARROW, &WIDE],
    };

    #[test]
    fn test_static_prefab() {
        assert_eq!(NARROW.new_config().width, 1);

        let prefab: PreFabConfig<ExampleConfig> = (&WIDE).into();
        assert_eq!(prefab.name, "wide");
        assert_eq!(prefab.description, "A wide config");
        assert_eq!(prefab.new_config().width, 100);

        let doubled = prefab.map_config(|c| ExampleConfig { width: c.width * 2 });
        assert_eq!(doubled.new_config().width, 200);
        assert_eq!(prefab.new_config().width, 100);

        let debug = format!("{:?}", prefab);
        assert!(debug.contains("wide"), "{debug}");
        assert!(!debug.contains("100"), "{debug}");
        let pretty = format!("{:#?}", prefab);
        assert!(pretty.contains("100"), "{pretty}");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(EXAMPLES.names(), vec!["narrow", "wide"]);
        assert_eq!(EXAMPLES.try_lookup("wide").unwrap().name, "wide");
        assert!(EXAMPLES.try_lookup("medium").is_none());
        assert_eq!(EXAMPLES.expect_lookup("narrow").new_config().width, 1);
    }

    #[test]
    #[should_panic(expected = "known: [\"narrow\", \"wide\"]")]
    fn test_expect_lookup_panics() {
        EXAMPLES.expect_lookup("medium");
    }
}
