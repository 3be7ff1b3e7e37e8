use bencher::{Payload, TestCase, TestGroup};
use bytes::{Buf, BufMut};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_socket::memory::{MemoryPool, RollingBuffer, SlabPool};
use std::hint::black_box;
use std::io::IoSlice;
use std::sync::Arc;

static REQUEST: &[u8] = b"GET /api/v1/users?page=2 HTTP/1.1\r\n\
Host: 127.0.0.1:8080\r\n\
User-Agent: bencher\r\n\
Accept: application/json\r\n\
Accept-Encoding: gzip, deflate, br\r\n\
Connection: keep-alive\r\n\r\n";

static BODY: [u8; 64 * 1024] = [b'x'; 64 * 1024];

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("request_header", Payload::new(REQUEST, REQUEST.len())),
        TestCase::small("request_header_trickled", Payload::new(REQUEST, 16)),
        TestCase::large("body_64k", Payload::new(&BODY, 4096)),
        TestCase::large("body_64k_unaligned", Payload::new(&BODY, 1500)),
    ]
}

fn batch_size(case: &TestCase) -> BatchSize {
    match case.group() {
        TestGroup::Small => BatchSize::SmallInput,
        TestGroup::Large => BatchSize::LargeInput,
    }
}

fn benchmark_write_then_consume(criterion: &mut Criterion) {
    let pool: Arc<dyn MemoryPool> = Arc::new(SlabPool::new());
    let mut group = criterion.benchmark_group("rolling_buffer_write_consume");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.payload().content().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || RollingBuffer::new(Arc::clone(&pool)),
                |buffer| {
                    for chunk in case.payload().chunks() {
                        buffer.put_slice(chunk);
                    }
                    let end = buffer.end();
                    black_box(buffer.occupied().remaining());
                    buffer.consume_to(end);
                },
                batch_size(case),
            );
        });
    }

    group.finish();
}

fn benchmark_gather(criterion: &mut Criterion) {
    let pool: Arc<dyn MemoryPool> = Arc::new(SlabPool::new());
    let mut group = criterion.benchmark_group("rolling_buffer_gather");

    for case in create_test_cases() {
        let mut buffer = RollingBuffer::new(Arc::clone(&pool));
        for chunk in case.payload().chunks() {
            buffer.put_slice(chunk);
        }

        group.throughput(Throughput::Bytes(buffer.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &buffer, |b, buffer| {
            b.iter(|| {
                let occupied = buffer.occupied();
                let mut slices = [IoSlice::new(&[]); 64];
                black_box(occupied.chunks_vectored(&mut slices));
            });
        });
    }

    group.finish();
}

criterion_group!(rolling_buffer, benchmark_write_then_consume, benchmark_gather);
criterion_main!(rolling_buffer);
