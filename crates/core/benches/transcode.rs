use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mobilis_core::{Document, Transcoder};

/// Builds a synthetic portal page: `sections` navigation blocks of short
/// links around one long article body.
fn portal_page(sections: usize) -> String {
    let mut html = String::from("<html><head><title>bench</title></head><body>");
    for section in 0..sections {
        html.push_str("<div>");
        for link in 0..8 {
            html.push_str(&format!(r#"<a href="/s{}/p{}">item {}</a>"#, section, link, link));
        }
        html.push_str("</div>");
    }
    html.push_str("<div><p>");
    for word in 0..400 {
        html.push_str(&format!("word{} ", word));
    }
    html.push_str("</p></div></body></html>");
    html
}

fn bench_parse(c: &mut Criterion) {
    let small = portal_page(2);
    let medium = portal_page(20);
    let large = portal_page(200);

    let mut group = c.benchmark_group("parse");

    group.bench_with_input(BenchmarkId::new("small", "2 sections"), &small, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("medium", "20 sections"), &medium, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("large", "200 sections"), &large, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.finish();
}

fn bench_full_transcode(c: &mut Criterion) {
    let html = portal_page(20);
    let transcoder = Transcoder::new().unwrap();

    c.bench_function("full_transcode", |b| {
        b.iter(|| {
            let doc = Document::parse(black_box(&html)).unwrap();
            transcoder.transcode("https://example.com/", Some(doc)).unwrap()
        })
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = Document::parse(&portal_page(20)).unwrap();

    c.bench_function("serialize", |b| b.iter(|| black_box(&doc).to_html()));
}

criterion_group!(benches, bench_parse, bench_full_transcode, bench_serialize);
criterion_main!(benches);
