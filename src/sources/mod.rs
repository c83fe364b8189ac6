//! Configuration sources: the backend contract and bundled backends.

/// Implements the lookup half of [`Source`] for a backend holding a
/// `tree: ValueTree` and a `deserializer: Arc<dyn Deserializer>`.
macro_rules! tree_hooks {
    () => {
        fn has(&self, key: &str, _kind: &$crate::kind::Kind) -> bool {
            self.tree.lookup(key).is_some()
        }

        fn is_null(&self, key: &str) -> bool {
            self.tree.is_null(key)
        }

        fn bool0(&self, key: &str) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.scalar(key)
        }

        fn char0(&self, key: &str) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.char(key)
        }

        fn string0(&self, key: &str) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.scalar(key)
        }

        fn number0(&self, key: &str) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.scalar(key)
        }

        fn list0(
            &self,
            key: &str,
            _kind: &$crate::kind::Kind,
        ) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.list(key, self.deserializer.as_ref())
        }

        fn set0(
            &self,
            key: &str,
            _kind: &$crate::kind::Kind,
        ) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.set(key, self.deserializer.as_ref())
        }

        fn map0(
            &self,
            key: &str,
            _kind: &$crate::kind::Kind,
        ) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.map(key, self.deserializer.as_ref())
        }

        fn custom0(
            &self,
            key: &str,
            _kind: &$crate::kind::Kind,
        ) -> $crate::error::Result<$crate::value::RawValue> {
            self.tree.custom(key, self.deserializer.as_ref())
        }

        fn entries(
            &self,
        ) -> $crate::error::Result<
            std::collections::BTreeMap<String, $crate::value::RawValue>,
        > {
            Ok(self.tree.flatten())
        }
    };
}

pub(crate) use tree_hooks;

mod env;
mod file;
mod map;
mod source;
mod tree;

pub use env::EnvSource;
pub use file::FileSource;
pub use map::{MapBacking, MapSource};
pub use source::{Source, SourceExt, check, custom_kind, decode_custom, fetch};
