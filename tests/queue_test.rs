//! Queue simulator behaviour under fixed and random draws

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signal_sim::simulation::{
    Direction, DirectionalCounts, DirectionalQueue, DirectionalRates, Phase, QueueSimulator,
    SimWorld, SimulationConfig, PEDESTRIAN_CAPACITY, VEHICLE_CAPACITY,
};

fn config_with_rates(arrival: f64, pedestrian: f64, service: f64) -> SimulationConfig {
    let mut config = SimulationConfig::default().with_seed(1);
    config.vehicle_arrival = DirectionalRates::uniform(arrival);
    config.pedestrian_arrival = DirectionalRates::uniform(pedestrian);
    config.service = DirectionalRates::uniform(service);
    config
}

fn simulator(config: &SimulationConfig, seed: u64) -> QueueSimulator {
    QueueSimulator::new(config, StdRng::seed_from_u64(seed))
}

#[test]
fn test_serviced_queue_drains_to_zero() {
    let mut config = config_with_rates(0.0, 0.0, 1.0);
    config.initial_vehicles = DirectionalCounts::new(5, 0, 0, 0);
    let mut queues = simulator(&config, 1);

    for _ in 0..5 {
        queues.advance(Phase::Phase1);
    }
    assert_eq!(queues.vehicle_queue(Direction::North).count(), 0);
    assert_eq!(queues.throughput().vehicles_served, 5);

    // Nothing left to serve, the queue must not underflow
    for _ in 0..5 {
        queues.advance(Phase::Phase1);
    }
    assert_eq!(queues.vehicle_queue(Direction::North).count(), 0);
    assert_eq!(queues.throughput().vehicles_served, 5);
}

#[test]
fn test_blocked_queue_saturates_at_capacity() {
    let config = config_with_rates(1.0, 0.0, 1.0);
    let mut queues = simulator(&config, 2);

    for _ in 0..20 {
        queues.advance(Phase::Phase1);
    }

    let vehicles = queues.vehicles();
    assert_eq!(vehicles.east, VEHICLE_CAPACITY);
    assert_eq!(vehicles.west, VEHICLE_CAPACITY);
    // One arrival and one departure every tick on the green axis
    assert_eq!(vehicles.north, 0);
    assert_eq!(vehicles.south, 0);
    assert_eq!(queues.throughput().vehicles_served, 40);
}

#[test]
fn test_serviced_queue_is_bounded_by_capacity() {
    let mut config = config_with_rates(1.0, 0.0, 0.1);
    config.initial_vehicles = DirectionalCounts::new(VEHICLE_CAPACITY, VEHICLE_CAPACITY, 0, 0);
    let mut queues = simulator(&config, 3);

    for _ in 0..50 {
        queues.advance(Phase::Phase1);
        assert!(queues.vehicle_queue(Direction::North).count() <= VEHICLE_CAPACITY);
        assert!(queues.vehicle_queue(Direction::South).count() <= VEHICLE_CAPACITY);
    }
}

#[test]
fn test_pedestrians_cross_on_the_red_axis() {
    let mut config = config_with_rates(0.0, 1.0, 1.0);
    config.initial_pedestrians = DirectionalCounts::new(2, 3, 1, 2);
    let mut queues = simulator(&config, 4);

    queues.advance(Phase::Phase1);
    assert_eq!(queues.pedestrians(), DirectionalCounts::new(3, 4, 0, 0));
    assert_eq!(queues.throughput().pedestrians_crossed, 3);

    for _ in 0..10 {
        queues.advance(Phase::Phase1);
    }
    assert_eq!(
        queues.pedestrians(),
        DirectionalCounts::new(PEDESTRIAN_CAPACITY, PEDESTRIAN_CAPACITY, 0, 0)
    );

    // Switching the phase lets the north-south pedestrians cross
    queues.advance(Phase::Phase2);
    let pedestrians = queues.pedestrians();
    assert_eq!(pedestrians.north, 0);
    assert_eq!(pedestrians.south, 0);
    assert_eq!(pedestrians.east, 1);
    assert_eq!(pedestrians.west, 1);
    assert_eq!(queues.throughput().pedestrians_crossed, 3 + 2 * u64::from(PEDESTRIAN_CAPACITY));
}

#[test]
fn test_densities_use_vehicle_capacity() {
    let mut config = config_with_rates(0.0, 0.0, 1.0);
    config.initial_vehicles = DirectionalCounts::new(5, 7, 3, 4);
    let queues = simulator(&config, 5);

    let densities = queues.densities();
    assert!((densities.phase1 - 12.0 / 15.0).abs() < 1e-9);
    assert!((densities.phase2 - 7.0 / 15.0).abs() < 1e-9);
    assert!((densities.for_phase(Phase::Phase2) - densities.phase2).abs() < 1e-9);
}

#[test]
fn test_full_intersection_density_reaches_two() {
    let mut config = config_with_rates(0.0, 0.0, 1.0);
    config.initial_vehicles = DirectionalCounts::new(15, 15, 15, 15);
    let queues = simulator(&config, 6);

    let densities = queues.densities();
    assert!((densities.phase1 - 2.0).abs() < 1e-9);
    assert!((densities.phase2 - 2.0).abs() < 1e-9);
}

#[test]
fn test_full_queues_at_max_capacity_do_not_overflow() {
    let mut config = config_with_rates(1.0, 1.0, 0.1);
    config.vehicle_capacity = u32::MAX;
    config.pedestrian_capacity = u32::MAX;
    config.initial_vehicles = DirectionalCounts::new(u32::MAX, u32::MAX, u32::MAX, 0);
    config.initial_pedestrians = DirectionalCounts::new(u32::MAX, u32::MAX, 0, 0);
    let mut queues = simulator(&config, 8);

    for _ in 0..10 {
        queues.advance(Phase::Phase1);
    }

    let vehicles = queues.vehicles();
    assert!(vehicles.north >= u32::MAX - 10);
    assert_eq!(vehicles.east, u32::MAX);
    assert_eq!(vehicles.total(), u32::MAX);
    assert_eq!(vehicles.phase_total(Phase::Phase1), u32::MAX);
    assert!(queues.densities().phase1 <= 2.0);
}

#[test]
fn test_queue_construction_clamps_count() {
    let queue = DirectionalQueue::new(20, 15);
    assert_eq!(queue.count(), 15);
    assert_eq!(queue.capacity(), 15);
}

#[test]
fn test_same_seed_same_queues() {
    let config = config_with_rates(0.6, 0.3, 0.5);
    let mut a = simulator(&config, 99);
    let mut b = simulator(&config, 99);

    for tick in 0..500 {
        let phase = if (tick / 25) % 2 == 0 {
            Phase::Phase1
        } else {
            Phase::Phase2
        };
        a.advance(phase);
        b.advance(phase);
        assert_eq!(a.vehicles(), b.vehicles());
        assert_eq!(a.pedestrians(), b.pedestrians());
    }
    assert_eq!(a.throughput(), b.throughput());
}

/// Mix of lowest allowed rates, certain events (>= 1) and ordinary probabilities
fn random_rates(rng: &mut StdRng, min: f64, max: f64) -> DirectionalRates {
    let mut draw = || match rng.random_range(0..5) {
        0 => min,
        1 => rng.random_range(1.0..=max),
        _ => rng.random_range(min..1.0),
    };
    DirectionalRates::new(draw(), draw(), draw(), draw())
}

fn random_counts(rng: &mut StdRng, capacity: u32) -> DirectionalCounts {
    let mut draw = || rng.random_range(0..=capacity);
    DirectionalCounts::new(draw(), draw(), draw(), draw())
}

fn random_config(rng: &mut StdRng) -> SimulationConfig {
    let mut config = SimulationConfig::default().with_seed(rng.random());
    config.vehicle_arrival = random_rates(rng, 0.0, 10.0);
    config.pedestrian_arrival = random_rates(rng, 0.0, 5.0);
    config.service = random_rates(rng, 0.1, 10.0);
    config.min_green_time = rng.random_range(5.0..=30.0);
    config.max_green_time = rng.random_range(30.0..=120.0);
    config.vehicle_capacity = rng.random_range(1..=30);
    config.pedestrian_capacity = rng.random_range(1..=15);
    config.initial_vehicles = random_counts(rng, config.vehicle_capacity);
    config.initial_pedestrians = random_counts(rng, config.pedestrian_capacity);
    config
}

#[test]
fn test_queues_stay_bounded_over_random_configs() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..20 {
        let config = random_config(&mut rng);
        let mut world = SimWorld::new(config.clone()).expect("generated config is valid");

        for tick in 1..=10_000u64 {
            let snapshot = world.tick(tick as f64);
            let queues = world.queues();
            for direction in Direction::ALL {
                let vehicles = queues.vehicle_queue(direction).count();
                let pedestrians = queues.pedestrian_queue(direction).count();
                assert!(vehicles <= config.vehicle_capacity, "{config:?}");
                assert!(pedestrians <= config.pedestrian_capacity, "{config:?}");
                assert_eq!(snapshot.vehicles.get(direction), vehicles);
            }
            assert!((0.0..=2.0).contains(&snapshot.phase1_density));
            assert!((0.0..=2.0).contains(&snapshot.phase2_density));
        }
        assert_eq!(world.queues().time_step(), 10_000);
        assert!(world.phase_switches() > 0);
    }
}
