//! End-to-end scenarios through the viewer and a headless backend

use glam::{Vec2, Vec3};

use block_tide::consts::{BASE_HEIGHT, FILTERED_HEIGHT};
use block_tide::contestants::{Contestant, ContestantId, ContestantRoster};
use block_tide::error::InteractionError;
use block_tide::renderer::headless::HeadlessRenderer;
use block_tide::renderer::shapes::ProceduralShapes;
use block_tide::scene::{Scene, Viewer};
use block_tide::settings::Settings;

const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

fn roster(categories: &[&str]) -> ContestantRoster {
    ContestantRoster::new(
        categories
            .iter()
            .enumerate()
            .map(|(i, category)| Contestant {
                id: ContestantId(100 + i as u32),
                name: format!("contestant {i}"),
                category: (*category).into(),
                progress: 0.1 * i as f32,
                color_index: i,
            })
            .collect(),
    )
}

fn unit_settings(width: i32, height: i32) -> Settings {
    Settings {
        zone_width: width,
        zone_height: height,
        max_block_width: 1,
        max_block_height: 1,
        resample_chance: 0.0,
        ..Settings::default()
    }
}

fn headless(settings: &Settings, roster: ContestantRoster, seed: u64) -> Viewer<HeadlessRenderer> {
    Viewer::init(settings, roster, &ProceduralShapes::default(), VIEWPORT, seed, |_| {
        Ok(HeadlessRenderer::new(VIEWPORT.x as u32, VIEWPORT.y as u32))
    })
    .unwrap()
}

#[test]
fn test_ten_by_ten_fills_zone() {
    let settings = Settings {
        zone_width: 10,
        zone_height: 10,
        square_chance: 0.0,
        resample_chance: 0.0,
        ..Settings::default()
    };
    let mut viewer = headless(&settings, ContestantRoster::default(), 1234);
    let scene = viewer.scene();
    assert!(scene.blocks().verify_coverage());
    assert!(scene.blocks().iter().all(|b| {
        let size = b.grid_box.size();
        size.x <= 3 && size.y <= 3
    }));
    let n = scene.blocks().len() as u32;
    assert_eq!(scene.batch().instance_count(), 2 * n);

    viewer.step(1.0 / 60.0);
    assert_eq!(viewer.renderer().instances(), 2 * n as usize);
    assert!(viewer.renderer().draw_calls() <= 9);
}

#[test]
fn test_same_seed_same_layout() {
    let settings = Settings {
        zone_width: 12,
        zone_height: 9,
        ..Settings::default()
    };
    let a = Scene::new(&settings, ContestantRoster::default(), &ProceduralShapes::default(), VIEWPORT, 77).unwrap();
    let b = Scene::new(&settings, ContestantRoster::default(), &ProceduralShapes::default(), VIEWPORT, 77).unwrap();
    let boxes = |s: &Scene| s.blocks().iter().map(|b| (b.grid_box, b.top, b.rotation)).collect::<Vec<_>>();
    assert_eq!(boxes(&a), boxes(&b));
}

#[test]
fn test_category_filter_sinks_and_freezes() {
    let settings = unit_settings(5, 1);
    let mut viewer = headless(&settings, roster(&["prize", "race", "prize", "race", "race"]), 3);
    for _ in 0..30 {
        viewer.step(1.0 / 60.0);
    }
    assert_eq!(viewer.scene().blocks().len(), 5);

    viewer.scene_mut().set_active_category(Some("prize"));
    assert!(viewer.scene().wave().is_frozen());
    let sunk = viewer
        .scene()
        .blocks()
        .iter()
        .filter(|b| b.target_height == FILTERED_HEIGHT)
        .count();
    assert_eq!(sunk, 3);

    for _ in 0..120 {
        viewer.step(1.0 / 60.0);
    }
    let scene = viewer.scene();
    for block in scene.blocks().iter() {
        let expected = if scene.roster().category_of(block.contestant) == Some("prize") {
            BASE_HEIGHT
        } else {
            FILTERED_HEIGHT
        };
        assert!((block.height - expected).abs() < 1e-3, "height {} vs {}", block.height, expected);
    }

    viewer.scene_mut().set_active_category(None);
    assert!(!viewer.scene().wave().is_frozen());
    assert!(viewer.scene().active_category().is_none());
}

#[test]
fn test_click_selects_block_under_pointer() {
    let settings = unit_settings(1, 1);
    let mut viewer = headless(&settings, roster(&["prize"]), 9);
    viewer.step(1.0 / 60.0);

    let block = viewer.scene().blocks().get(0).unwrap().clone();
    let target = Vec3::new(block.center.x, block.height * 0.5, block.center.y);
    let screen = viewer.scene().camera().project(target).unwrap();

    let click = viewer.scene_mut().handle_click(screen).unwrap().unwrap();
    assert_eq!(click.index, 0);
    assert_eq!(click.id, block.id);
    assert_eq!(click.contestant, Some(ContestantId(100)));
    assert_eq!(viewer.scene().selected(), Some(0));
    assert!(viewer.scene().blocks().get(0).unwrap().highlighted);

    for _ in 0..30 {
        viewer.step(1.0 / 60.0);
    }
    let agent = viewer.scene().agent(0).unwrap();
    assert!(agent.pose().unwrap().position.y > block.height);
}

#[test]
fn test_dispose_releases_everything() {
    let settings = unit_settings(4, 3);
    let mut viewer = headless(&settings, roster(&["prize", "race"]), 21);
    viewer.scene_mut().select(0).unwrap();
    viewer.step(1.0 / 60.0);
    assert!(!viewer.resource_counts().is_zero());

    viewer.dispose();
    viewer.dispose();
    assert!(viewer.resource_counts().is_zero());
    assert!(viewer.renderer().scene_released());
    assert_eq!(viewer.scene().agent_count(), 0);
    assert_eq!(viewer.scene_mut().handle_click(VIEWPORT * 0.5), Err(InteractionError::TornDown));
    assert_eq!(viewer.scene_mut().select(0), Err(InteractionError::TornDown));
    assert!(!viewer.scene_mut().set_color_mode(block_tide::sim::wave::ColorMode::Dark));
}

#[test]
fn test_render_errors_do_not_stop_frames() {
    let settings = unit_settings(3, 3);
    let mut viewer = headless(&settings, ContestantRoster::default(), 2);
    viewer.renderer_mut().fail_next_frames(2);
    for _ in 0..5 {
        viewer.step(1.0 / 60.0);
    }
    assert_eq!(viewer.frame_errors(), 2);
    assert_eq!(viewer.renderer().skipped(), 2);
    assert_eq!(viewer.renderer().frames(), 3);
    assert!((viewer.scene().elapsed() - 5.0 / 60.0).abs() < 1e-4);
}
