//! End-to-end scenarios for the session mirror against the in-memory remote.

use tia_core::test_support::FakeTia;
use tia_core::{
    Calibration2D, ComponentRef, DisplayOptions, Position2D, RemoteAdapter, SessionGraph, TiaError,
    ValueObject,
};
use tia_ipc::error_codes;

fn session() -> (SessionGraph, FakeTia) {
    let fake = FakeTia::new();
    let graph = SessionGraph::new(RemoteAdapter::shared(fake.clone())).unwrap();
    (graph, fake)
}

#[test]
fn test_open_and_split_displays_evenly() {
    let (mut graph, fake) = session();
    let window = graph.open(Some("W")).unwrap();
    assert_eq!(window.name(), "W");

    let window = graph.require_window_mut("W").unwrap();
    let first = window
        .add_display("D1", DisplayOptions::default())
        .unwrap()
        .name()
        .to_string();
    assert_eq!(first, "D1");
    assert_eq!(fake.split_portion("W", "D1"), Some(1.0));

    let second = window
        .add_display("D1", DisplayOptions::default())
        .unwrap()
        .name()
        .to_string();
    assert_eq!(second, "D2");
    assert_eq!(fake.split_portion("W", "D2"), Some(0.5));
}

#[test]
fn test_explicit_split_portion_is_passed_through() {
    let (mut graph, fake) = session();
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window
        .add_display("D", DisplayOptions::default().with_split_portion(0.3))
        .unwrap();
    assert_eq!(fake.split_portion("W", "D"), Some(0.3));
}

#[test]
fn test_open_resolves_local_collisions() {
    let (mut graph, _fake) = session();
    let names = graph.open_many(Some("W"), 3).unwrap();
    assert_eq!(names, vec!["W", "W1", "W2"]);
    assert_eq!(graph.windows().len(), 3);
}

#[test]
fn test_open_surfaces_remote_rejection() {
    let fake = FakeTia::new().with_window_limit(1);
    let mut graph = SessionGraph::new(RemoteAdapter::shared(fake.clone())).unwrap();
    graph.open(None).unwrap();
    let err = graph.open(None).unwrap_err();
    assert!(matches!(err, TiaError::RemoteCall { .. }));
    assert_eq!(err.code(), error_codes::RESOURCE_LIMIT);
    assert_eq!(graph.windows().len(), 1);
}

#[test]
fn test_close_unknown_window_is_a_no_op() {
    let (mut graph, fake) = session();
    graph.close("missing").unwrap();
    assert_eq!(fake.call_count("CloseDisplayWindow"), 0);
}

#[test]
fn test_close_all_tolerates_externally_closed_window() {
    let (mut graph, fake) = session();
    graph.open(Some("A")).unwrap();
    graph.open(Some("B")).unwrap();
    fake.close_window_externally("A");

    graph.close_all().unwrap();
    assert!(graph.windows().is_empty());
    assert!(fake.window_names().is_empty());
}

#[test]
fn test_refresh_rebuilds_tree_and_skips_unknown_tags() {
    let (mut graph, fake) = session();
    graph.open(Some("W")).unwrap();
    fake.seed_range2d("r", [0.0, 0.0], [10.0, 6.0]);
    fake.insert_unknown_variable("spectrum", "Data1D");

    graph.refresh_all().unwrap();
    assert!(graph.window("W").is_some());
    assert!(graph.variable("spectrum").is_none());
    let range = graph.range2d("r").unwrap();
    assert_eq!(range.size(), (10.0, 6.0));
    assert_eq!(range.center(), Position2D::new(5.0, 3.0));
}

#[test]
fn test_range_update_rederives_size_and_center() {
    let (mut graph, _fake) = session();
    graph
        .add_range2d("r", Position2D::new(0.0, 0.0), Position2D::new(10.0, 6.0))
        .unwrap();
    let updated = graph
        .update_range2d("r", Position2D::new(2.0, 2.0), Position2D::new(4.0, 8.0))
        .unwrap();
    assert_eq!(updated.size(), (2.0, 6.0));
    assert_eq!(updated.center(), Position2D::new(3.0, 5.0));
    assert_eq!(graph.range2d("r").unwrap(), updated);
}

#[test]
fn test_variable_type_conflict_is_a_remote_error() {
    let (mut graph, _fake) = session();
    graph.add_position2d("v", Position2D::new(0.0, 0.0)).unwrap();
    let err = graph.add_position_collection("v").unwrap_err();
    assert_eq!(err.code(), error_codes::VARIABLE_TYPE_CONFLICT);
    assert!(matches!(graph.variable("v"), Some(ValueObject::Position2D(_))));
}

#[test]
fn test_image_pixel_grid_follows_row_column_order() {
    let (mut graph, _fake) = session();
    graph
        .add_calibration2d("cal", Calibration2D::new(0.0, 0.0, 1.0, 1.0))
        .unwrap();
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window.add_display("D", DisplayOptions::default()).unwrap();
    let display = window.display_mut("D").unwrap();
    let image = display.add_image("img", 3, 3, "cal").unwrap();

    let data = image.data();
    assert_eq!(data.value.shape(), (3, 3));
    let grid = &data.pixel_position;
    assert_eq!(grid.at(0, 0), Some(Position2D::new(0.0, 0.0)));
    assert_eq!(grid.at(0, 1), Some(Position2D::new(1.0, 0.0)));
    assert_eq!(grid.at(1, 0), Some(Position2D::new(0.0, 1.0)));
}

#[test]
fn test_rectangular_image_shapes_agree() {
    let (mut graph, fake) = session();
    fake.seed_calibration2d("cal", [1.0, -2.0], [0.5, 0.25]);
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window.add_display("D", DisplayOptions::default()).unwrap();
    let display = window.display_mut("D").unwrap();
    let image = display.add_image("img", 4, 2, "cal").unwrap();

    let data = image.data();
    assert_eq!(data.value.shape(), (2, 4));
    assert_eq!(data.pixel_position.shape(), (2, 4));
    assert_eq!(data.pixel_position.at(1, 3), Some(Position2D::new(2.5, -1.75)));
}

#[test]
fn test_degenerate_calibration_cannot_back_an_image() {
    let (mut graph, fake) = session();
    fake.seed_calibration2d("flat", [0.0, 0.0], [0.0, 1.0]);
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window.add_display("D", DisplayOptions::default()).unwrap();
    let display = window.display_mut("D").unwrap();
    let err = display.add_image("img", 2, 2, "flat").unwrap_err();
    assert!(matches!(err, TiaError::DegenerateCalibration { .. }));
}

#[test]
fn test_components_are_keyed_by_path() {
    let (mut graph, fake) = session();
    fake.seed_calibration2d("cal", [0.0, 0.0], [1.0, 1.0]);
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window.add_display("D", DisplayOptions::default()).unwrap();
    window
        .display_mut("D")
        .unwrap()
        .add_image("img", 2, 2, "cal")
        .unwrap();
    fake.seed_position_marker("W", "D", "m1", [0.5, 0.5]);
    graph.refresh_all().unwrap();

    let components = graph.components();
    let keys: Vec<&str> = components.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "W",
            "W/D",
            "W/D/img",
            "W/D/img/calibration",
            "W/D/img/range",
            "W/D/m1",
            "cal",
        ]
    );
    assert!(matches!(components["W/D/m1"], ComponentRef::Marker(p) if *p == Position2D::new(0.5, 0.5)));
    assert!(matches!(components["cal"], ComponentRef::Variable(ValueObject::Calibration2D(_))));
}

#[test]
fn test_tree_rendering_is_tab_indented() {
    let (mut graph, _fake) = session();
    graph.open(Some("W")).unwrap();
    graph
        .require_window_mut("W")
        .unwrap()
        .add_display("D", DisplayOptions::default())
        .unwrap();
    assert_eq!(graph.to_string(), "Session\n\tW\n\t\tD\n");
}

#[test]
fn test_sub_collection_is_registered() {
    let (mut graph, _fake) = session();
    let pc = graph.add_position_collection("pc").unwrap();
    pc.set_line_pattern(Position2D::new(0.0, 0.0), Position2D::new(4.0, 0.0), 5)
        .unwrap();

    let sub = graph.add_sub_collection("pc", "tail", 3, 4).unwrap();
    assert_eq!(sub.positions(), &[Position2D::new(3.0, 0.0), Position2D::new(4.0, 0.0)]);
    assert!(matches!(
        graph.variable("tail"),
        Some(ValueObject::PositionCollection(_))
    ));
}

#[test]
fn test_delete_missing_display_is_lenient() {
    let (mut graph, fake) = session();
    graph.open(Some("W")).unwrap();
    let window = graph.require_window_mut("W").unwrap();
    window.delete_display("nope").unwrap();
    assert_eq!(fake.call_count("DeleteDisplay"), 0);

    window.add_displays("D", 2).unwrap();
    window.delete_all_displays().unwrap();
    assert!(window.displays().is_empty());
}
