use aegis::domain::errors::DomainResult;
use aegis::domain::models::{RiskLevel, ToolInput, ToolKind};
use aegis::domain::ports::ToolBackend;
use aegis::services::{topological_order, PlanValidator, TaskDescriptor, ToolRegistry};
use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::Value;
use std::sync::Arc;

struct NoopBackend;

#[async_trait]
impl ToolBackend for NoopBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::FileRead
    }

    async fn invoke(&self, _input: &ToolInput) -> DomainResult<Value> {
        Ok(Value::Null)
    }
}

fn descriptor(i: usize, deps: Vec<usize>) -> TaskDescriptor {
    let mut input = ToolInput::new();
    input.insert("path".to_string(), Value::String(format!("file_{i}.txt")));
    TaskDescriptor {
        id: format!("t{i}"),
        description: format!("Read file {i}"),
        tool: "file_read".to_string(),
        tool_input: input,
        dependencies: deps.into_iter().map(|d| format!("t{d}")).collect(),
        risk_level: RiskLevel::Low,
    }
}

/// Linear chain listed in reverse so every task precedes its dependency.
fn chain(size: usize) -> Vec<TaskDescriptor> {
    (0..size)
        .rev()
        .map(|i| descriptor(i, if i == 0 { vec![] } else { vec![i - 1] }))
        .collect()
}

/// Layers of four tasks, each depending on every task of the previous layer.
fn layered(size: usize) -> Vec<TaskDescriptor> {
    (0..size)
        .map(|i| {
            let layer = i / 4;
            let deps = if layer == 0 {
                vec![]
            } else {
                ((layer - 1) * 4..layer * 4).collect()
            };
            descriptor(i, deps)
        })
        .collect()
}

fn bench_validate(c: &mut Criterion) {
    let validator = PlanValidator::new(Arc::new(
        ToolRegistry::new().with_backend(Arc::new(NoopBackend)),
    ));

    let mut group = c.benchmark_group("validate");
    for size in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, &size| {
            b.iter_batched(
                || chain(size),
                |plan| black_box(validator.validate(plan)),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("layered", size), &size, |b, &size| {
            b.iter_batched(
                || layered(size),
                |plan| black_box(validator.validate(plan)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_topological_order(c: &mut Criterion) {
    let validator = PlanValidator::new(Arc::new(
        ToolRegistry::new().with_backend(Arc::new(NoopBackend)),
    ));
    let Ok(plan) = validator.validate(layered(500)) else {
        return;
    };

    c.bench_function("topological_order/layered_500", |b| {
        b.iter(|| black_box(topological_order(&plan)));
    });
}

criterion_group!(benches, bench_validate, bench_topological_order);
criterion_main!(benches);
