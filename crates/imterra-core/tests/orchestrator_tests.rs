//! Renderer lifecycle and viewport binding tests

mod common;

use std::rc::Rc;

use common::recorder::{RecordingFactory, UNSUPPORTED_RENDERER};
use imterra_core::backend::RendererDescriptor;
use imterra_core::layer::MapLayer;
use imterra_core::map::Map;
use imterra_core::orchestrator::MapController;
use imterra_core::view::{ViewEvent, Viewport};

fn live_map() -> (Map, Rc<RecordingFactory>, MapController) {
    common::init_tracing();
    let map = Map::new();
    map.renderer.set(Some(RendererDescriptor::new("webgl")));
    let factory = RecordingFactory::new();
    let controller = MapController::with_factory(&map, factory.clone());
    (map, factory, controller)
}

// === Viewport feedback suppression ===

#[test]
fn test_renderer_viewport_is_not_echoed() {
    let (map, factory, _controller) = live_map();
    let renderer = factory.last();
    factory.clear();

    let v1 = Viewport::centered([10.0, 20.0], 5.0);
    renderer.emit_view(ViewEvent::ViewportChanged(v1.clone()));

    assert_eq!(map.view.viewport.get(), v1);
    assert!(factory.calls_with("set_viewport").is_empty());
}

#[test]
fn test_application_viewport_is_pushed() {
    let (map, factory, _controller) = live_map();
    let renderer = factory.last();
    renderer.emit_view(ViewEvent::ViewportChanged(Viewport::centered([10.0, 20.0], 5.0)));
    factory.clear();

    let v2 = Viewport::centered([30.0, 40.0], 2.0);
    map.view.viewport.set(v2.clone());

    assert_eq!(factory.calls_with("set_viewport"), vec!["set_viewport(30, 40, 2)"]);
    assert_eq!(renderer.viewport(), Some(v2));
}

#[test]
fn test_unchanged_renderer_viewport_leaves_no_suppression_behind() {
    let (map, factory, _controller) = live_map();
    let renderer = factory.last();
    let current = map.view.viewport.get();
    factory.clear();

    renderer.emit_view(ViewEvent::ViewportChanged(current));
    map.view.viewport.set(Viewport::centered([1.0, 2.0], 3.0));

    assert_eq!(factory.calls_with("set_viewport"), vec!["set_viewport(1, 2, 3)"]);
}

#[test]
fn test_updating_flag_follows_renderer() {
    let (map, factory, _controller) = live_map();
    factory.last().emit_view(ViewEvent::UpdatingChanged(true));
    assert!(map.view.updating.get());
    factory.last().emit_view(ViewEvent::UpdatingChanged(false));
    assert!(!map.view.updating.get());
}

#[test]
fn test_new_renderer_starts_at_current_viewport() {
    let (map, factory, _controller) = live_map();
    map.view.viewport.set(Viewport::centered([5.0, 6.0], 7.0));
    map.renderer.set(Some(RendererDescriptor::new("canvas")));

    assert_eq!(
        factory.last().viewport(),
        Some(Viewport::centered([5.0, 6.0], 7.0))
    );
}

// === Renderer (re)instantiation ===

#[test]
fn test_descriptor_change_rebuilds_everything() {
    let (map, factory, controller) = live_map();
    map.root_children()
        .push(MapLayer::tile("osm", "https://tile.example"));
    factory.clear();

    map.renderer.set(Some(RendererDescriptor::new("canvas")));

    let calls = factory.calls();
    let torn_down = calls.iter().position(|c| c == "osm.destroy");
    let old_gone = calls.iter().position(|c| c == "destroy_renderer(webgl)");
    let created = calls
        .iter()
        .position(|c| c == "create_renderer(canvas, EPSG:3857)");
    assert!(torn_down.is_some() && old_gone.is_some() && created.is_some());
    assert!(torn_down < old_gone && old_gone < created);

    let renderers = factory.renderers();
    assert_eq!(renderers.len(), 2);
    assert!(!renderers[0].has_view_handler());
    assert!(renderers[1].layer("osm").is_some());
    assert_eq!(renderers[1].layer_group().as_deref(), Some("root"));
    assert_eq!(controller.renderer().map(|r| r.id().to_string()), Some("canvas".into()));
    assert_eq!(
        map.live_renderer().map(|r| r.id().to_string()),
        Some("canvas".into())
    );
}

#[test]
fn test_projection_change_rebuilds_renderer() {
    let (map, factory, _controller) = live_map();
    map.view.projection.set("EPSG:4326".to_string());

    assert_eq!(factory.renderers().len(), 2);
    assert_eq!(factory.last().projection(), "EPSG:4326");
}

#[test]
fn test_clearing_descriptor_tears_down() {
    let (map, factory, controller) = live_map();
    map.renderer.set(None);

    assert!(!controller.is_live());
    assert!(map.live_renderer().is_none());
    assert_eq!(factory.calls_with("destroy_renderer"), vec!["destroy_renderer(webgl)"]);
}

#[test]
fn test_unsupported_renderer_leaves_map_unrendered() {
    let (map, factory, controller) = live_map();
    map.root_children()
        .push(MapLayer::tile("osm", "https://tile.example"));
    factory.clear();

    map.renderer
        .set(Some(RendererDescriptor::new(UNSUPPORTED_RENDERER)));

    assert!(!controller.is_live());
    assert!(map.live_renderer().is_none());
    assert!(factory.calls_with("create_layer").is_empty());
}

#[test]
fn test_viewport_extent_comes_from_live_renderer() {
    let (map, _factory, _controller) = live_map();
    map.view.viewport.set(Viewport::centered([0.0, 0.0], 1.0));

    let extent = map.viewport_extent().expect("live renderer reports an extent");
    assert!(extent.contains([100.0, -100.0]));
    assert!(!extent.contains([1000.0, 0.0]));
}

#[test]
fn test_drop_destroys_renderer() {
    let (map, factory, controller) = live_map();
    drop(controller);

    assert_eq!(factory.calls_with("destroy_renderer"), vec!["destroy_renderer(webgl)"]);
    assert!(map.live_renderer().is_none());

    map.renderer.set(Some(RendererDescriptor::new("canvas")));
    assert_eq!(factory.renderers().len(), 1);
}
