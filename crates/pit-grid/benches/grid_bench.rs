use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use pit_grid::{sweep, Aabb, SpatialGrid};

fn ring(count: usize, radius: f32) -> Vec<Aabb> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Aabb::new(Vec2::new(angle.cos(), angle.sin()) * radius, Vec2::splat(0.05))
        })
        .collect()
}

fn populated(count: usize) -> SpatialGrid<u64> {
    let mut grid = SpatialGrid::new(10, 10).unwrap();
    for c in 0..10 {
        grid.add_static(c, 0);
        grid.add_static(c, 9);
        grid.add_static(0, c);
        grid.add_static(9, c);
    }
    for (i, aabb) in ring(count, 0.6).into_iter().enumerate() {
        grid.add_dynamic(i as u64, aabb);
    }
    grid
}

fn bench_refresh(c: &mut Criterion) {
    let mut grid = populated(100);
    let shrunk = ring(100, 0.3);

    c.bench_function("grid_refresh_100", |b| {
        b.iter(|| {
            grid.refresh(|k| shrunk.get(k as usize).copied());
            black_box(grid.dynamic_count())
        })
    });
}

fn bench_broad_and_narrow(c: &mut Criterion) {
    // Tight cluster so most bodies share buckets.
    let mut grid = populated(0);
    for (i, aabb) in ring(100, 0.15).into_iter().enumerate() {
        grid.add_dynamic(i as u64, aabb);
    }
    let step = Vec2::new(1.0 / 60.0, 0.0);

    c.bench_function("candidates_and_sweep_100", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for i in 0..grid.dynamic_count() {
                let Some(key) = grid.key_at(i) else { continue };
                let Some(a) = grid.occupancy(key).map(|o| o.aabb) else { continue };
                for j in grid.candidates(i) {
                    let Some(other) = grid.key_at(j).and_then(|k| grid.occupancy(k)) else {
                        continue;
                    };
                    if sweep(&a, step, &other.aabb).is_some() {
                        hits += 1;
                    }
                }
            }
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_refresh, bench_broad_and_narrow);
criterion_main!(benches);
