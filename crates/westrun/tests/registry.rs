//! Randomized id allocation checks for the per-connection registry.

use std::collections::HashSet;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use westrun::Error;
use westrun::Interface;
use westrun::ObjectId;
use westrun::Registry;
use westrun::SessionId;

#[test]
fn test_random_create_destroy_never_reuses_ids() {
    let interface = Interface::builder("buffer", 1).build().unwrap();

    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut registry = Registry::new(SessionId(seed));
        let mut issued = HashSet::new();
        let mut live: Vec<ObjectId> = Vec::new();

        for _ in 0..500 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let id = registry.create_resource(interface.clone()).unwrap();
                assert!(issued.insert(id), "id {} handed out twice", id);
                assert_ne!(id, ObjectId::ROOT);
                live.push(id);
            } else {
                let index = rng.gen_range(0..live.len());
                let id = live.swap_remove(index);
                registry.destroy(id).unwrap();
                assert!(matches!(registry.lookup(id), Err(Error::UnknownObject(_))));
            }

            assert_eq!(registry.len(), live.len() + 1);
        }

        for id in &live {
            assert_eq!(registry.lookup(*id).unwrap().id(), *id);
        }
    }
}

#[test]
fn test_random_peer_ids_stay_monotonic() {
    let interface = Interface::builder("region", 1).build().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut registry = Registry::new(SessionId(1));
    let mut highest = ObjectId::ROOT;

    for _ in 0..200 {
        let candidate = ObjectId(rng.gen_range(1..10_000));
        let result = registry.bind_new_id(candidate, interface.clone());

        if candidate > highest {
            result.unwrap();
            highest = candidate;
            assert_eq!(registry.next_id(), ObjectId(candidate.0 + 1));
        } else {
            assert!(matches!(result, Err(Error::InvalidNewId { .. })));
        }
    }
}
