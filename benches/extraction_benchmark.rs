use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quick_contract::{ContentExtractor, ContractGenerator, MockProvider, ReadabilityExtractor};
use std::sync::Arc;
use std::time::Duration;

const TERMS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>特定商取引法に基づく表記</title></head>
<body>
    <nav><a href="/">Home</a> <a href="/shop">Shop</a> <a href="/help">Help</a></nav>
    <div id="main-content">
        <p>販売価格は各商品ページに記載の金額（税込）とし、送料は全国一律550円とします。</p>
        <p>お支払いはクレジットカード、銀行振込、コンビニ払いからお選びいただけます。</p>
        <p>商品は注文確定後3営業日以内に発送し、返品は到着後8日以内に限り受け付けます。</p>
    </div>
    <footer><p>Copyright Example Inc. All rights reserved.</p></footer>
</body>
</html>"#;

fn bench_extraction(c: &mut Criterion) {
    let extractor = ReadabilityExtractor::default();
    let large_page = format!(
        "<html><body><div>{}</div></body></html>",
        format!("<p>{}</p>", "取引条件の説明文、".repeat(60)).repeat(500)
    );

    let mut group = c.benchmark_group("extraction");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));

    group.bench_function("terms_page", |b| {
        b.iter(|| black_box(extractor.extract(black_box(TERMS_PAGE)).unwrap()))
    });

    group.bench_function("large_page_truncated", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&large_page)).unwrap()))
    });

    group.finish();
}

fn bench_post_process(c: &mut Criterion) {
    let generator = ContractGenerator::new(Arc::new(MockProvider::with_reply("")), "SYSTEM");
    let raw = format!("「{}。追加の文。」", "利用者は料金を支払う".repeat(10));

    c.bench_function("post_process_long_reply", |b| {
        b.iter(|| black_box(generator.post_process(black_box(&raw)).unwrap()))
    });
}

criterion_group!(benches, bench_extraction, bench_post_process);
criterion_main!(benches);
