//! End-to-end behavior of the CPU simulation: spawning, layout and trails.

use screenprint::{
    parse_records, EntityRecord, ParamChange, Params, Simulation, SpawnState, TrailParams, Vec2,
};

fn records(n: usize, categories: &[&str]) -> Vec<EntityRecord> {
    (0..n)
        .map(|i| EntityRecord {
            id: format!("e{i}"),
            name: format!("Entity {i}"),
            supertype: Some(categories[i % categories.len()].to_string()),
            ..Default::default()
        })
        .collect()
}

fn active_ids(sim: &Simulation) -> Vec<String> {
    sim.active().map(|e| e.id.clone()).collect()
}

#[test]
fn spawn_scenario_eight_entities_cap_five() {
    let params = Params {
        spawn_delay_ms: 100.0,
        max_active: 5,
        ..Default::default()
    };
    let mut sim = Simulation::new(params, Vec2::new(800.0, 600.0));
    sim.set_data(&records(8, &["a", "b", "c"]));

    // 10 ms frames starting at t = 0
    let mut t = 0;
    while t <= 250 {
        sim.step(t as f64);
        t += 10;
    }
    assert_eq!(active_ids(&sim), ["e0", "e1", "e2"]);

    while t <= 500 {
        sim.step(t as f64);
        t += 10;
    }
    assert_eq!(active_ids(&sim), ["e0", "e1", "e2", "e3", "e4"]);

    while t <= 5000 {
        sim.step(t as f64);
        t += 10;
    }
    assert_eq!(sim.store().active_count(), 5);
}

#[test]
fn spawn_cadence_matches_delay() {
    let params = Params {
        spawn_delay_ms: 200.0,
        max_active: 50,
        ..Default::default()
    };
    let mut sim = Simulation::new(params, Vec2::new(800.0, 600.0));
    sim.set_data(&records(20, &["a"]));

    // one frame per millisecond: spawns land at 0, 201, 402, ...
    for t in 0..=1000 {
        sim.step(t as f64);
        let expected = (t / 201 + 1).min(20);
        assert_eq!(sim.store().active_count(), expected, "t = {t}");
    }
}

#[test]
fn boundary_invariant_holds_every_tick() {
    let (w, h) = (500.0, 400.0);
    let params = Params {
        spawn_delay_ms: 50.0,
        max_active: 200,
        center_strength: 0.2,
        ..Default::default()
    };
    let margin = params.margin;
    let mut sim = Simulation::new(params, Vec2::new(w, h));
    sim.set_data(&records(120, &["a", "b", "c", "d"]));

    for frame in 0..1500 {
        sim.step(frame as f64 * 16.0);
        for e in sim.active() {
            assert!(
                e.position.x >= margin && e.position.x <= w - margin,
                "x out of bounds at frame {frame}: {:?}",
                e.position
            );
            assert!(
                e.position.y >= margin && e.position.y <= h - margin,
                "y out of bounds at frame {frame}: {:?}",
                e.position
            );
        }
    }
}

#[test]
fn trail_ages_stay_below_length() {
    let params = Params {
        spawn_delay_ms: 50.0,
        trail: TrailParams {
            length: 20,
            interval: 4,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut sim = Simulation::new(params, Vec2::new(600.0, 600.0));
    sim.set_data(&records(10, &["a", "b"]));

    let mut previous = 0;
    for frame in 0..400 {
        sim.step(frame as f64 * 16.0);
        assert!(sim.trail_points().all(|p| p.age < 20));

        let count = sim.trail_points().len();
        if sim.tick_count() % 4 != 0 {
            assert!(count <= previous, "grew without sampling at tick {}", sim.tick_count());
        }
        previous = count;
    }
    // bounded by active × length / interval
    assert!(previous <= 10 * 20 / 4);
}

#[test]
fn trail_points_are_restartable() {
    let mut sim = Simulation::new(Params::default(), Vec2::new(600.0, 600.0));
    sim.set_data(&records(4, &["a"]));
    for frame in 0..300 {
        sim.step(frame as f64 * 16.0);
    }
    let points = sim.trail_points();
    let first: Vec<_> = points.clone().collect();
    let second: Vec<_> = points.collect();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn grouping_converges_on_anchors() {
    let params = Params {
        grouping: true,
        spawn_delay_ms: 50.0,
        ..Default::default()
    };
    let mut sim = Simulation::new(params, Vec2::new(800.0, 800.0));
    sim.set_data(&records(6, &["a", "b", "c"]));

    // one spawn per frame until all six are active
    for frame in 0..1500 {
        sim.step(frame as f64 * 100.0);
    }
    assert_eq!(sim.store().active_count(), 6);
    assert!(sim.layout().is_settled());

    for e in sim.active() {
        let anchor = sim.layout().anchors().get(&e.category).unwrap();
        let distance = e.position.distance(anchor);
        assert!(distance < 60.0, "{} is {distance} px from its anchor", e.id);
    }
}

#[test]
fn toggling_grouping_reheats() {
    let mut sim = Simulation::new(Params::default(), Vec2::new(800.0, 800.0));
    sim.set_data(&records(3, &["a", "b", "c"]));
    for frame in 0..2000 {
        sim.step(frame as f64 * 16.0);
    }
    assert!(sim.layout().is_settled());
    sim.apply(ParamChange::Grouping(true));
    assert_eq!(sim.layout().alpha(), 1.0);
}

#[test]
fn missing_category_gets_default_bucket() {
    let mut recs = records(3, &["a"]);
    recs[1].supertype = None;
    let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
    sim.set_data(&recs);
    let entity = sim.entity("e1").unwrap();
    assert_eq!(entity.category, screenprint::entity::DEFAULT_CATEGORY);
}

#[test]
fn out_of_range_changes_are_clamped() {
    let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
    sim.apply(ParamChange::Damping(7.0));
    sim.apply(ParamChange::CenterStrength(f32::NAN));
    assert_eq!(sim.params().damping, 1.0);
    assert_eq!(sim.params().center_strength, Params::default().center_strength);
}

#[test]
fn remove_all_keeps_spawn_order() {
    let params = Params {
        spawn_delay_ms: 100.0,
        max_active: 10,
        ..Default::default()
    };
    let mut sim = Simulation::new(params, Vec2::new(600.0, 600.0));
    sim.set_data(&records(8, &["a", "b"]));

    // spawns at 0, 110, 220
    let mut t = 0;
    while t <= 250 {
        sim.step(t as f64);
        t += 10;
    }
    assert_eq!(active_ids(&sim), ["e0", "e1", "e2"]);
    assert_ne!(sim.trail_points().len(), 0);

    sim.remove_all();
    assert_eq!(sim.store().active_count(), 0);
    assert_eq!(sim.trail_points().len(), 0);
    assert_eq!(sim.layout().alpha(), 1.0);
    assert_eq!(sim.entity("e0").map(|e| e.spawn), Some(SpawnState::Removed));

    // the next spawns land at 330 and 440
    while t <= 450 {
        sim.step(t as f64);
        t += 10;
    }
    assert_eq!(active_ids(&sim), ["e3", "e4"]);

    sim.restart();
    sim.step(t as f64);
    assert_eq!(active_ids(&sim), ["e0"]);
}

#[test]
fn grouping_radius_moves_anchors() {
    let mut sim = Simulation::new(Params::default(), Vec2::new(800.0, 800.0));
    sim.set_data(&records(3, &["a", "b", "c"]));
    let center = Vec2::new(400.0, 400.0);

    let before = sim.layout().anchors().get("a").unwrap();
    assert!((before.distance(center) - Params::default().grouping_radius).abs() < 1e-3);

    sim.apply(ParamChange::GroupingRadius(120.0));
    for label in ["a", "b", "c"] {
        let anchor = sim.layout().anchors().get(label).unwrap();
        assert!((anchor.distance(center) - 120.0).abs() < 1e-3, "{label}: {anchor:?}");
    }
    assert_ne!(sim.layout().anchors().get("a").unwrap(), before);
    assert_eq!(sim.layout().alpha(), 1.0);
}

#[test]
fn malformed_colors_fall_back_to_category() {
    let json = r##"[
        {"id": "a", "supertype": "x", "color": "a€ab"},
        {"id": "b", "supertype": "x", "color": "#€"},
        {"id": "c", "supertype": "x", "color": "#12345"},
        {"id": "d", "supertype": "x", "color": "#ff0000"}
    ]"##;
    let records = parse_records(json).unwrap();
    let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
    sim.set_data(&records);

    let category = sim.palette().get("x").unwrap();
    for id in ["a", "b", "c"] {
        let entity = sim.entity(id).unwrap();
        assert_eq!(entity.color, category, "{id}");
        assert!(!entity.color_override, "{id}");
    }
    let d = sim.entity("d").unwrap();
    assert!(d.color_override);
    assert_eq!(d.color, glam::Vec3::X);
}
