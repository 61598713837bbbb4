use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use wallet_ledger::domains::wallet::models::OperationKind;

#[path = "../tests/common/mod.rs"]
mod bench_common;

use bench_common::{mutation_for, setup_test_with_config, test_config, TestContext, TEST_AGENT};

const MUTATION_BATCHES: [usize; 3] = [1_000, 5_000, 10_000];
const NUM_BENCH_USERS: usize = 100;

fn setup_bench() -> TestContext {
    let mut config = test_config();
    config.lock_timeout = std::time::Duration::from_secs(5);
    let ctx = setup_test_with_config(config);
    for u in 0..NUM_BENCH_USERS {
        ctx.store.seed_account(TEST_AGENT, &format!("bench{}", u), 1_000_000_000);
    }
    ctx
}

/// 계정 100개에 분산된 변경 처리량 (엔진 + 메모리 저장소)
fn bench_mutation_tps(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create Tokio runtime");
    let mut group = c.benchmark_group("mutation_tps");

    for &count in MUTATION_BATCHES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                rt.block_on(async {
                    let ctx = setup_bench();

                    let start = Instant::now();
                    submit_mutations(&ctx, count).await;
                    black_box(start.elapsed())
                })
            });
        });
    }

    group.finish();
}

/// 단일 계정 경합 (모든 요청이 같은 락을 기다림)
fn bench_hot_account(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create Tokio runtime");

    c.bench_function("hot_account_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = setup_bench();
                let mut handles = Vec::with_capacity(1_000);
                for idx in 0..1_000 {
                    let engine = ctx.engine.clone();
                    let mutation = mutation_for(
                        TEST_AGENT,
                        "bench0",
                        &format!("hot-{}", idx),
                        1,
                        OperationKind::Credit,
                    );
                    handles.push(tokio::spawn(async move { engine.apply(mutation).await }));
                }
                for handle in handles {
                    let _ = black_box(handle.await);
                }
            })
        });
    });
}

/// 쓰기 지연 큐 → DB 동기화 처리량
fn bench_sync_drain(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create Tokio runtime");

    c.bench_function("sync_drain_5000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = setup_bench();
                submit_mutations(&ctx, 5_000).await;

                let start = Instant::now();
                let processed = ctx.drain_queue().await;
                black_box((processed, start.elapsed()))
            })
        });
    });
}

async fn submit_mutations(ctx: &TestContext, total: usize) {
    let engine = Arc::clone(&ctx.engine);
    let mut handles = Vec::with_capacity(total);

    for idx in 0..total {
        let user = format!("bench{}", idx % NUM_BENCH_USERS);
        let kind = if idx % 2 == 0 {
            OperationKind::Credit
        } else {
            OperationKind::Debit { game_id: Some(idx as i64) }
        };
        let mutation = mutation_for(TEST_AGENT, &user, &format!("bench-{}", idx), 10, kind);
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.apply(mutation).await }));
    }

    for handle in handles {
        let _ = black_box(handle.await);
    }
}

criterion_group!(benches, bench_mutation_tps, bench_hot_account, bench_sync_drain);
criterion_main!(benches);
