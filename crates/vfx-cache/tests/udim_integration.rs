//! UDIM virtual-file resolution exercised end-to-end: pattern detection
//! and grid resolution through [`FileRegistry`] against real files on disk,
//! plus the coordinator-level view of the virtual parent file.

use std::sync::Arc;

use vfx_cache::{CacheConfig, CacheCoordinator, FileRegistry, IdentityColorPipeline, VfxIoInputCreator};
use vfx_core::spec::AttrValue;

#[test]
fn s4_udim_pattern_resolves_known_tiles() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["tex.1001.exr", "tex.1011.exr", "tex.1002.exr"] {
        std::fs::File::create(dir.path().join(name)).unwrap();
    }
    let pattern = dir.path().join("tex.<UDIM>.exr");
    let pattern = pattern.to_str().unwrap();

    let registry = FileRegistry::default();
    let (_, idx, _) = registry.find_or_create(pattern, None, false);
    assert!(registry.get(idx).is_virtual());
    assert!(registry.resolve_udim(idx, 0, 0).is_some());
    assert!(registry.resolve_udim(idx, 1, 0).is_some());
    assert!(registry.resolve_udim(idx, 0, 1).is_some());
    assert!(registry.resolve_udim(idx, 3, 0).is_none());

    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(VfxIoInputCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file(pattern).unwrap();
    assert_eq!(coord.get_image_info(file, "exists"), Some(AttrValue::Int(1)));
}
