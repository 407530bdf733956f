use std::hint::black_box;
use std::time::Instant;

use entstream_core::{EntitySnapshot, InboundMessage, StreamConfig, Streamer};
use glam::Vec3;

fn make_entities(entity_count: usize, spacing: f32, range: f32) -> Vec<EntitySnapshot> {
    let side = (entity_count as f32).sqrt().ceil() as usize;
    (0..entity_count)
        .map(|i| {
            let x = -9_000.0 + (i % side) as f32 * spacing;
            let y = -9_000.0 + (i / side) as f32 * spacing;
            EntitySnapshot::new(i as u64, Vec3::new(x, y, 0.0), range)
        })
        .collect()
}

fn loaded_streamer(entity_count: usize) -> Streamer {
    let mut streamer = Streamer::new(StreamConfig::default()).expect("default config is valid");
    streamer.handle(InboundMessage::replace_all(make_entities(entity_count, 40.0, 60.0)));
    streamer
}

fn bench_rebuild(entity_count: usize, iterations: usize) {
    let entities = make_entities(entity_count, 40.0, 60.0);
    let mut streamer = Streamer::new(StreamConfig::default()).expect("default config is valid");

    let start = Instant::now();
    for _ in 0..iterations {
        let msg = InboundMessage::replace_all(entities.iter().copied());
        black_box(streamer.handle(black_box(msg)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  rebuild ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_position_ticks(entity_count: usize, iterations: usize) {
    let mut streamer = loaded_streamer(entity_count);

    let start = Instant::now();
    for i in 0..iterations {
        // Observer walks a diagonal through the populated area.
        let step = (i % 200) as f32 * 10.0;
        let pos = Vec3::new(-9_000.0 + step, -9_000.0 + step, 0.0);
        black_box(streamer.handle(black_box(InboundMessage::at(pos))));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  position tick ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}, tracked={}",
        streamer.stats().tracked
    );
}

fn main() {
    println!("=== Streamer Benchmarks ===\n");

    println!("Full-set rebuild:");
    bench_rebuild(100, 1000);
    bench_rebuild(1000, 100);
    bench_rebuild(10000, 10);

    println!("\nPosition tick (should stay flat as population grows):");
    bench_position_ticks(100, 10000);
    bench_position_ticks(1000, 10000);
    bench_position_ticks(10000, 10000);

    println!("\n=== Done ===");
}
