use cavorite::net::stream::{Mode, Stream};
use cavorite::sim::activation::ActivationSystem;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn stream_write_mixed(c: &mut Criterion) {
    c.bench_function("stream_write_mixed", |b| {
        let mut buffer = [0u8; 1024];
        b.iter(|| {
            for byte in buffer.iter_mut() {
                *byte = 0;
            }
            let mut stream = Stream::new(Mode::Write, &mut buffer);
            for i in 0..64u32 {
                let mut value = i * 7 % 100;
                stream.serialize_integer(&mut value, 0, 100).unwrap();
                let mut flag = i & 1 == 0;
                stream.serialize_boolean(&mut flag).unwrap();
                let mut position = i as f32 * 0.37;
                stream.serialize_float(&mut position).unwrap();
            }
            black_box(stream.bits_processed());
        })
    });
}

fn activation_update_sweep(c: &mut Criterion) {
    c.bench_function("activation_update_sweep", |b| {
        let mut system = ActivationSystem::new(1024, 10.0, 64, 64, 1.0, 64, 64);
        for id in 1..=512 {
            let x = (id as f32 * 0.37).sin() * 30.0;
            let y = (id as f32 * 0.73).cos() * 30.0;
            system.insert_object(id, x, y).unwrap();
        }
        let mut t = 0.0f32;
        b.iter(|| {
            t += 0.1;
            system.move_activation_point(t.sin() * 20.0, t.cos() * 20.0);
            system.update(0.1);
            system.clear_events();
            black_box(system.active_count());
        })
    });
}

criterion_group!(benches, stream_write_mixed, activation_update_sweep);
criterion_main!(benches);
