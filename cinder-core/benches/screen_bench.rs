use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cinder_core::{Dimensions, Screen, Snapshot};

fn bench_print_throughput(c: &mut Criterion) {
    let text: String = "the quick brown fox jumps over the lazy dog "
        .chars()
        .cycle()
        .take(10_000)
        .collect();

    c.bench_function("screen_print_10k", |b| {
        b.iter(|| {
            let mut screen = Screen::new(Dimensions::new(80, 24));
            for ch in black_box(&text).chars() {
                screen.print(ch);
            }
            screen
        });
    });
}

fn bench_scroll(c: &mut Criterion) {
    c.bench_function("screen_scroll_1k_lines", |b| {
        b.iter(|| {
            let mut screen = Screen::new(Dimensions::new(80, 24));
            for i in 0..1_000 {
                for ch in format!("line {i}").chars() {
                    screen.print(ch);
                }
                screen.carriage_return();
                screen.linefeed();
            }
            screen
        });
    });
}

fn bench_reflow(c: &mut Criterion) {
    c.bench_function("screen_reflow_resize", |b| {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        for i in 0..500 {
            for ch in format!("some wrapping text content number {i} ").chars() {
                screen.print(ch);
            }
        }
        b.iter(|| {
            screen.resize(Dimensions::new(60, 24));
            screen.resize(Dimensions::new(80, 24));
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut screen = Screen::new(Dimensions::new(120, 40));
    for ch in "colorful content ".chars().cycle().take(120 * 40) {
        screen.print(ch);
    }
    c.bench_function("snapshot_capture", |b| {
        b.iter(|| Snapshot::capture(black_box(&screen)));
    });
}

criterion_group!(
    benches,
    bench_print_throughput,
    bench_scroll,
    bench_reflow,
    bench_snapshot
);
criterion_main!(benches);
