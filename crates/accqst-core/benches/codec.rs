use criterion::{black_box, criterion_group, criterion_main, Criterion};

use accqst_core::accounts::AccountDirectory;
use accqst_core::codec::{decode_stored, SolutionCodec};
use accqst_core::model::{LedgerRowInput, PartInput, SolutionRecord};

fn accounts() -> AccountDirectory {
    let mut xml = String::from("<konten>");
    for number in (1000..1400).step_by(10) {
        xml.push_str(&format!(r#"<konto nummer="{number}" titel="Account {number}"/>"#));
    }
    xml.push_str("</konten>");

    let mut dir = AccountDirectory::new();
    dir.set_definition(&xml).expect("accounts");
    dir
}

fn inputs(parts: u64, lines: usize) -> Vec<PartInput> {
    (1..=parts)
        .map(|part_id| PartInput {
            part_id,
            max_lines: lines,
            rows: (0..lines)
                .map(|i| LedgerRowInput {
                    left_account: format!("{}", 1000 + i * 10),
                    left_amount: format!("{},50", i * 100),
                    right_account: format!("{}", 1390 - i * 10),
                    right_amount: format!("{},50", i * 100),
                })
                .collect(),
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let dir = accounts();
    let codec = SolutionCodec::new(&dir);
    let small = inputs(1, 4);
    let large = inputs(8, 12);
    let stored = SolutionRecord::from_rows([codec.encode_submission(&large).expect("encode")]);

    let mut legacy = SolutionRecord::new();
    for part in 1..=8 {
        legacy.insert(format!("accqst_input_{part}"), "<input></input>");
        legacy.insert(format!("accqst_student_{part}"), "analysis");
        legacy.insert(format!("accqst_correct_{part}"), "analysis");
    }

    group.bench_function("encode_small", |b| {
        b.iter(|| codec.encode_submission(black_box(&small)))
    });

    group.bench_function("encode_large", |b| {
        b.iter(|| codec.encode_submission(black_box(&large)))
    });

    group.bench_function("decode_current", |b| {
        b.iter(|| decode_stored(black_box(&stored)))
    });

    group.bench_function("decode_legacy", |b| {
        b.iter(|| decode_stored(black_box(&legacy)))
    });

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
