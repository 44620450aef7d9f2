use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use storefront_core::ProductId;
use storefront_infra::document_store::InMemoryDocumentStore;
use storefront_infra::reservation::{LockedReservation, Reserve, TransactionalReservation};
use storefront_infra::stock_ledger::{STOCK_COLLECTION, StockLedger};
use storefront_inventory::{
    OrderLineItem, OrderPayload, ProposedStock, SizeKey, StockTable, is_fulfillable,
};
use tokio::runtime::Runtime;

const SIZES: [&str; 4] = ["S", "M", "L", "XL"];

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// One line per product, cycling through the sizes.
fn payload(lines: usize) -> OrderPayload {
    let items = (0..lines)
        .map(|i| OrderLineItem::new(format!("product-{i}"), SIZES[i % SIZES.len()], 1))
        .collect();
    OrderPayload::new(items, 0.0)
}

fn full_stock() -> ProposedStock {
    SizeKey::ALL
        .iter()
        .fold(ProposedStock::new(), |p, size| p.with(*size, 1_000_000))
}

async fn stocked_ledger(products: usize) -> Arc<StockLedger<Arc<InMemoryDocumentStore>>> {
    let ledger = StockLedger::open(Arc::new(InMemoryDocumentStore::new()), STOCK_COLLECTION)
        .await
        .unwrap();
    for i in 0..products {
        ledger
            .set(&ProductId::new(format!("product-{i}")), &full_stock())
            .await
            .unwrap();
    }
    Arc::new(ledger)
}

fn bench_fulfillment_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("fulfillment_check");

    for lines in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*lines as u64));
        group.bench_with_input(BenchmarkId::new("is_fulfillable", lines), lines, |b, &lines| {
            let mut table = StockTable::new();
            for i in 0..lines {
                table.set(&ProductId::new(format!("product-{i}")), &full_stock());
            }
            let request = payload(lines);

            b.iter(|| black_box(is_fulfillable(&table, black_box(&request))));
        });
    }

    group.finish();
}

fn bench_reserve_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("reserve_release");
    let rt = runtime();

    for lines in [1usize, 10].iter() {
        group.throughput(Throughput::Elements(*lines as u64));

        group.bench_with_input(BenchmarkId::new("locked", lines), lines, |b, &lines| {
            let reservations = LockedReservation::new(rt.block_on(stocked_ledger(lines)));
            let request = payload(lines);

            b.iter(|| {
                rt.block_on(async {
                    let result = reservations.reserve(&request).await.unwrap();
                    reservations.release(&request).await.unwrap();
                    black_box(result)
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("transactional", lines), lines, |b, &lines| {
            let reservations = TransactionalReservation::new(rt.block_on(stocked_ledger(lines)));
            let request = payload(lines);

            b.iter(|| {
                rt.block_on(async {
                    let result = reservations.reserve(&request).await.unwrap();
                    reservations.release(&request).await.unwrap();
                    black_box(result)
                })
            });
        });
    }

    group.finish();
}

fn bench_rejection(c: &mut Criterion) {
    let rt = runtime();
    let reservations = LockedReservation::new(rt.block_on(stocked_ledger(0)));
    let request = payload(10);

    c.bench_function("reserve_rejected_unknown_products", |b| {
        b.iter(|| rt.block_on(async { black_box(reservations.reserve(&request).await.unwrap()) }));
    });
}

criterion_group!(
    benches,
    bench_fulfillment_check,
    bench_reserve_release,
    bench_rejection,
);
criterion_main!(benches);
