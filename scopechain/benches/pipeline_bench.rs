//! Benchmarks for scoped chain dispatch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scopechain::context::RequestContext;
use scopechain::pipeline::Pipeline;
use scopechain::scope::RootContainer;
use scopechain::stages::{register_greeting_stages, StageKind, ECHO, GREET};
use std::sync::Arc;

fn pipeline_of(len: usize) -> Pipeline {
    let mut builder = RootContainer::builder();
    register_greeting_stages(&mut builder).expect("register greeting stages");
    let mut stages: Vec<StageKind> = vec![GREET; len];
    stages.push(ECHO);
    Pipeline::builder("bench")
        .container(Arc::new(builder.build()))
        .stages(stages)
        .build()
        .expect("build pipeline")
}

fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");

    let mut group = c.benchmark_group("dispatch");
    for len in [1_usize, 4, 16] {
        let pipeline = pipeline_of(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &pipeline, |b, pipeline| {
            b.iter(|| {
                let request = Arc::new(RequestContext::new("GET", "/"));
                let outcome = runtime.block_on(pipeline.handle(request.clone()));
                black_box(outcome).expect("dispatch");
            });
        });
    }
    group.finish();
}

fn build_chain_benchmark(c: &mut Criterion) {
    let pipeline = pipeline_of(16);
    c.bench_function("build_chain_16", |b| b.iter(|| black_box(pipeline.build_chain())));
}

criterion_group!(benches, dispatch_benchmark, build_chain_benchmark);
criterion_main!(benches);
