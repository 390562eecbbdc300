use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dropship::core::config::DEFAULT_CONFIRM_CONTROL;
use dropship::services::locator::{self, ElementQuery};

fn sample_dump(rows: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" clickable="false" enabled="true" bounds="[0,0][1080,2400]">"#,
    );
    for i in 0..rows {
        xml.push_str(&format!(
            r#"<node index="{i}" text="Item {i}" resource-id="com.google.android.apps.photos:id/row" class="android.widget.TextView" clickable="true" enabled="true" bounds="[0,{top}][1080,{bottom}]" />"#,
            i = i,
            top = i * 10,
            bottom = i * 10 + 10
        ));
    }
    xml.push_str(r#"<node index="999" text="Upload" resource-id="com.google.android.apps.photos:id/upload_button" class="android.widget.Button" clickable="true" enabled="true" bounds="[100,200][300,400]" /></node></hierarchy>"#);
    xml.push_str("UI hierchary dumped to: /dev/tty");
    xml
}

fn bench_snapshot(c: &mut Criterion) {
    let raw = sample_dump(200);
    let query: ElementQuery = match DEFAULT_CONFIRM_CONTROL.parse() {
        Ok(q) => q,
        Err(e) => panic!("default query: {}", e),
    };

    c.bench_function("extract_snapshot", |b| {
        b.iter(|| locator::extract_snapshot(black_box(&raw)))
    });

    c.bench_function("find_confirm_control", |b| {
        b.iter(|| {
            let xml = locator::extract_snapshot(black_box(&raw)).ok();
            xml.map(|x| locator::find_in_snapshot(x, black_box(&query)))
        })
    });

    c.bench_function("parse_element_query", |b| {
        b.iter(|| black_box(DEFAULT_CONFIRM_CONTROL).parse::<ElementQuery>())
    });
}

criterion_group!(benches, bench_snapshot);
criterion_main!(benches);
