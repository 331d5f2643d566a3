use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tether_core::{computed, effect, reactive, Ref, Target, Value};

fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("effects");

    for &fan_out in &[1_usize, 16, 256] {
        group.bench_function(format!("field_write(fan_out={fan_out})"), |b| {
            let state = reactive(Target::object_from([("count", 0)]));
            let sink = Rc::new(Cell::new(0.0));
            let runners: Vec<_> = (0..fan_out)
                .map(|_| {
                    let state = state.clone();
                    let sink = sink.clone();
                    effect(move || sink.set(state.get("count").as_f64().unwrap_or_default()))
                })
                .collect();

            let mut next = 0;
            b.iter(|| {
                next += 1;
                state.set("count", next).unwrap();
            });
            black_box(sink.get());
            runners.iter().for_each(|runner| runner.stop());
        });
    }

    group.bench_function("branch_switch", |b| {
        let state = reactive(Target::object_from([
            ("cond", Value::from(true)),
            ("a", Value::from(1)),
            ("b", Value::from(2)),
        ]));
        let runner = effect({
            let state = state.clone();
            move || {
                if state.get("cond").is_truthy() {
                    black_box(state.get("a"));
                } else {
                    black_box(state.get("b"));
                }
            }
        });

        let mut cond = true;
        b.iter(|| {
            cond = !cond;
            state.set("cond", cond).unwrap();
        });
        runner.stop();
    });

    group.finish();
}

fn bench_computed(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed");

    for &depth in &[1_usize, 8, 64] {
        group.bench_function(format!("chain_read(depth={depth})"), |b| {
            b.iter_batched(
                || {
                    let source = Ref::new(1);
                    let mut head = {
                        let source = source.clone();
                        computed(move || source.get().as_f64().unwrap_or_default())
                    };
                    for _ in 1..depth {
                        let prev = head.clone();
                        head = computed(move || prev.get() + 1.0);
                    }
                    (source, head)
                },
                |(source, head)| {
                    source.set(2).unwrap();
                    black_box(head.get());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("collections");

    group.bench_function("map_insert_with_iterating_effect", |b| {
        b.iter_batched(
            || {
                let map = reactive(Target::map());
                let runner = effect({
                    let map = map.clone();
                    move || {
                        black_box(map.size().unwrap_or_default());
                    }
                });
                (map, runner)
            },
            |(map, runner)| {
                for key in 0..64 {
                    map.insert(key, key).unwrap();
                }
                runner.stop();
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("array_push", |b| {
        b.iter_batched(
            || reactive(Target::array(Vec::<Value>::new())),
            |list| {
                for item in 0..64 {
                    list.push([item]).unwrap();
                }
                black_box(list.len());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_effects, bench_computed, bench_collections);
criterion_main!(benches);
