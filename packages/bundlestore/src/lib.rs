//! Bundlestore: editor bundles and themes with pristine, installed and local
//! versions, plus the snippet engine that expands their snippets.
//!
//! - [`plist`] stores property-list documents and reads and writes them.
//! - [`catalog`] tracks every bundle, bundle item and theme across versions.
//! - [`snippet`] expands snippet templates into a text buffer.

pub use bundlestore_catalog as catalog;
pub use bundlestore_plist as plist;
pub use bundlestore_snippet as snippet;

pub use bundlestore_catalog::{BundleCatalog, CatalogConfig, CatalogError, ItemKind, Locality};
pub use bundlestore_plist::{Plist, PlistTable};
pub use bundlestore_snippet::{Environment, SnippetEngine, SnippetError, TextBuffer};

/// The environment a bundle's snippets expand with: `base` plus the
/// bundle's own variables, which win on conflict.
pub fn snippet_environment(catalog: &BundleCatalog, bundle: usize, base: &Environment) -> Environment {
    let mut env = base.clone();
    env.extend(catalog.bundle_environment(bundle));
    env
}

/// Starts the snippet item `item` of `bundle` at the buffer's cursor.
/// Returns `false` if the item does not exist or has no `content`.
pub fn insert_bundle_snippet<R, B>(
    engine: &mut SnippetEngine<R>,
    buf: &mut B,
    catalog: &BundleCatalog,
    bundle: usize,
    item: usize,
    base: &Environment,
) -> Result<bool, SnippetError>
where
    R: snippet::CommandRunner,
    B: TextBuffer + ?Sized,
{
    let Some(content) = catalog
        .get(ItemKind::Snippet, bundle, item)
        .and_then(|dict| dict.get_string("content"))
    else {
        return Ok(false);
    };
    let env = snippet_environment(catalog, bundle, base);
    engine.start_snippet(buf, content, &env)?;
    Ok(true)
}
