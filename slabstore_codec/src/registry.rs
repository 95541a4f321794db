//! The process-wide codec registry.
//!
//! Codecs are registered at compile time with [`inventory::submit!`] or at runtime with [`register_codec`].
//! Runtime registrations take precedence over compile-time registrations with the same name.

use std::sync::{Arc, LazyLock};

use itertools::Itertools;
use parking_lot::RwLock;

use crate::{BytesToBytesCodecTraits, CodecCreateError, CodecMetadata};

/// Whether a registered codec can encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    /// The codec can encode.
    pub encode_enabled: bool,
    /// The codec can decode.
    pub decode_enabled: bool,
}

impl Default for CodecInfo {
    fn default() -> Self {
        Self {
            encode_enabled: true,
            decode_enabled: true,
        }
    }
}

type CodecCreateFn =
    fn(metadata: &CodecMetadata) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError>;

/// A codec plugin.
#[derive(Debug)]
pub struct CodecPlugin {
    name: &'static str,
    create_fn: CodecCreateFn,
    info: CodecInfo,
}
inventory::collect!(CodecPlugin);

impl CodecPlugin {
    /// Create a new codec plugin which can encode and decode.
    pub const fn new(name: &'static str, create_fn: CodecCreateFn) -> Self {
        Self {
            name,
            create_fn,
            info: CodecInfo {
                encode_enabled: true,
                decode_enabled: true,
            },
        }
    }

    /// Create a new codec plugin with explicit encode/decode availability.
    pub const fn new_with_info(
        name: &'static str,
        create_fn: CodecCreateFn,
        info: CodecInfo,
    ) -> Self {
        Self {
            name,
            create_fn,
            info,
        }
    }

    /// The codec name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The encode/decode availability of the codec.
    #[must_use]
    pub const fn info(&self) -> CodecInfo {
        self.info
    }

    /// Returns true if this plugin is associated with `name`.
    #[must_use]
    pub fn match_name(&self, name: &str) -> bool {
        self.name == name
    }

    /// Create a codec from `metadata`.
    ///
    /// # Errors
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn create(
        &self,
        metadata: &CodecMetadata,
    ) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
        (self.create_fn)(metadata)
    }
}

/// A handle to a registered plugin. See [`RuntimeRegistry::register`].
pub type CodecRuntimeRegistryHandle = Arc<CodecPlugin>;

/// A runtime registry for plugins.
///
/// Plugins are held as [`Arc`]s and can be unregistered by handle.
#[derive(Debug)]
pub struct RuntimeRegistry<P> {
    plugins: RwLock<Vec<Arc<P>>>,
}

impl<P> RuntimeRegistry<P> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Register a plugin and return a handle for later unregistration.
    pub fn register(&self, plugin: P) -> Arc<P> {
        let plugin = Arc::new(plugin);
        self.plugins.write().push(Arc::clone(&plugin));
        plugin
    }

    /// Unregister a plugin by its handle.
    ///
    /// Returns `true` if the plugin was found and removed, `false` otherwise.
    pub fn unregister(&self, handle: &Arc<P>) -> bool {
        let mut plugins = self.plugins.write();
        if let Some(pos) = plugins.iter().position(|p| Arc::ptr_eq(p, handle)) {
            plugins.remove(pos);
            true
        } else {
            false
        }
    }

    /// Execute a closure with read access to all registered plugins.
    pub fn with_plugins<R>(&self, f: impl FnOnce(&[Arc<P>]) -> R) -> R {
        f(&self.plugins.read())
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    /// Returns true if no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

impl<P> Default for RuntimeRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Global runtime registry for codec plugins.
pub static CODEC_RUNTIME_REGISTRY: LazyLock<RuntimeRegistry<CodecPlugin>> =
    LazyLock::new(RuntimeRegistry::new);

/// Register a codec plugin at runtime.
///
/// Returns a handle that can be used to unregister the plugin later.
pub fn register_codec(plugin: CodecPlugin) -> CodecRuntimeRegistryHandle {
    log::debug!("registering codec {}", plugin.name());
    CODEC_RUNTIME_REGISTRY.register(plugin)
}

/// Unregister a runtime codec plugin.
///
/// Returns `true` if the plugin was found and removed, `false` otherwise.
pub fn unregister_codec(handle: &CodecRuntimeRegistryHandle) -> bool {
    CODEC_RUNTIME_REGISTRY.unregister(handle)
}

fn find_plugin<R>(name: &str, f: impl Fn(&CodecPlugin) -> R) -> Option<R> {
    let runtime = CODEC_RUNTIME_REGISTRY.with_plugins(|plugins| {
        plugins
            .iter()
            .find(|plugin| plugin.match_name(name))
            .map(|plugin| f(plugin.as_ref()))
    });
    runtime.or_else(|| {
        inventory::iter::<CodecPlugin>
            .into_iter()
            .find(|plugin| plugin.match_name(name))
            .map(f)
    })
}

/// Create a codec from its metadata.
///
/// # Errors
/// Returns [`CodecCreateError::UnknownCodec`] if no codec is registered with the metadata name, or an error from the codec plugin.
pub fn create_codec(
    metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    find_plugin(metadata.name(), |plugin| plugin.create(metadata))
        .unwrap_or_else(|| Err(CodecCreateError::UnknownCodec(metadata.name().to_string())))
}

/// Returns true if a codec is registered with `name`.
#[must_use]
pub fn codec_available(name: &str) -> bool {
    find_plugin(name, |_| ()).is_some()
}

/// Return the encode/decode availability of the codec registered with `name`.
#[must_use]
pub fn codec_info(name: &str) -> Option<CodecInfo> {
    find_plugin(name, CodecPlugin::info)
}

/// The names of all registered codecs, sorted.
#[must_use]
pub fn registered_codecs() -> Vec<&'static str> {
    let runtime = CODEC_RUNTIME_REGISTRY
        .with_plugins(|plugins| plugins.iter().map(|plugin| plugin.name()).collect_vec());
    runtime
        .into_iter()
        .chain(inventory::iter::<CodecPlugin>.into_iter().map(CodecPlugin::name))
        .sorted_unstable()
        .dedup()
        .collect()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::bytes_to_bytes::fletcher32::Fletcher32Codec;

    fn create_decode_only(
        _metadata: &CodecMetadata,
    ) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
        Ok(Arc::new(Fletcher32Codec::new()))
    }

    #[test]
    fn registry_builtin() {
        assert!(codec_available("shuffle"));
        assert!(codec_available("fletcher32"));
        assert!(!codec_available("szip"));
        assert_eq!(codec_info("fletcher32"), Some(CodecInfo::default()));
        assert_eq!(codec_info("szip"), None);
        let codecs = registered_codecs();
        assert!(codecs.contains(&"shuffle"));
        assert!(codecs.contains(&"fletcher32"));
        #[cfg(feature = "gzip")]
        assert!(codecs.contains(&"gzip"));
    }

    #[test]
    fn registry_unknown_codec() {
        assert!(matches!(
            create_codec(&CodecMetadata::new("szip")),
            Err(CodecCreateError::UnknownCodec(name)) if name == "szip"
        ));
    }

    #[test]
    #[serial]
    fn registry_runtime() {
        let info = CodecInfo {
            encode_enabled: false,
            decode_enabled: true,
        };
        let handle = register_codec(CodecPlugin::new_with_info(
            "test.decode_only",
            create_decode_only,
            info,
        ));
        assert!(codec_available("test.decode_only"));
        assert_eq!(codec_info("test.decode_only"), Some(info));
        assert!(registered_codecs().contains(&"test.decode_only"));
        assert!(create_codec(&CodecMetadata::new("test.decode_only")).is_ok());

        assert!(unregister_codec(&handle));
        assert!(!unregister_codec(&handle));
        assert!(!codec_available("test.decode_only"));
    }

    #[test]
    fn runtime_registry() {
        let registry: RuntimeRegistry<String> = RuntimeRegistry::new();
        assert!(registry.is_empty());
        let a = registry.register("a".to_string());
        let _b = registry.register("b".to_string());
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister(&a));
        assert_eq!(
            registry.with_plugins(|plugins| plugins.iter().map(|p| p.as_str().to_string()).collect_vec()),
            vec!["b".to_string()]
        );
    }
}
