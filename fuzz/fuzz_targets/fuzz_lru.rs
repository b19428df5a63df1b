#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use keyward::cache::LruCache;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Put(u8, u16),
    Get(u8),
    Peek(u8),
    Remove(u8),
    Clear,
}

#[derive(Arbitrary, Debug)]
struct LruFuzzInput {
    capacity: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: LruFuzzInput| {
    let capacity = (input.capacity % 32) as usize + 1;
    let mut cache = LruCache::new(capacity).expect("capacity is positive");
    // Model: key -> (value, last use tick)
    let mut model: HashMap<u8, (u16, u64)> = HashMap::new();
    let mut tick = 0u64;

    for op in input.ops {
        tick += 1;
        match op {
            Op::Put(key, value) => {
                let previous = cache.put(key, value);
                assert_eq!(previous, model.get(&key).map(|(v, _)| *v));
                if !model.contains_key(&key) && model.len() == capacity {
                    let (&oldest, _) = model
                        .iter()
                        .min_by_key(|(_, (_, used))| *used)
                        .expect("model is full");
                    model.remove(&oldest);
                }
                model.insert(key, (value, tick));
            }
            Op::Get(key) => {
                let got = cache.get(&key).copied();
                assert_eq!(got, model.get(&key).map(|(v, _)| *v));
                if let Some(entry) = model.get_mut(&key) {
                    entry.1 = tick;
                }
            }
            Op::Peek(key) => {
                assert_eq!(cache.peek(&key).copied(), model.get(&key).map(|(v, _)| *v));
            }
            Op::Remove(key) => {
                assert_eq!(cache.remove(&key), model.remove(&key).map(|(v, _)| v));
            }
            Op::Clear => {
                cache.clear();
                model.clear();
            }
        }
        assert!(cache.len() <= capacity);
        assert_eq!(cache.len(), model.len());
    }
});
