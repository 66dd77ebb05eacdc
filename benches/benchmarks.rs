use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tms_pulse::{
    detector::detect_peaks,
    detrend::detrend,
    grouping::{group_pulses, GroupingMode, RepetitiveConfig},
    polarity::Membership,
    threshold::compute_thresholds,
    DetrendMode, FindPulseConfig, PulseFinder, ThresholdSpec, Trace,
};

const SRATE: f64 = 5000.0;

/// Drifting EEG-like trace with a 40-pulse train every 10 s of recording.
fn synthetic_trace(len: usize) -> Vec<f64> {
    let mut samples: Vec<f64> = (0..len)
        .map(|i| {
            let t = i as f64 / SRATE;
            25.0 * libm::sin(2.0 * core::f64::consts::PI * 10.0 * t)
                + 8.0 * libm::sin(2.0 * core::f64::consts::PI * 47.0 * t)
                + 15.0 * t
        })
        .collect();

    let train_period = (10.0 * SRATE) as usize;
    let pulse_gap = (0.025 * SRATE) as usize;
    let mut start = train_period / 2;
    while start + 40 * pulse_gap < len {
        for k in 0..40 {
            samples[start + k * pulse_gap] += 3000.0;
        }
        start += train_period;
    }
    samples
}

// 10 s, 60 s and 5 min of recording at 5 kHz
const LENGTHS: [usize; 3] = [50_000, 300_000, 1_500_000];

fn bench_detrend(c: &mut Criterion) {
    let mut group = c.benchmark_group("detrend");

    for &len in LENGTHS.iter() {
        let samples = synthetic_trace(len);
        group.throughput(Throughput::Elements(len as u64));

        for mode in [DetrendMode::Linear, DetrendMode::Poly] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode).to_lowercase(), len),
                &samples,
                |b, samples| {
                    b.iter(|| black_box(detrend(black_box(samples), mode)));
                },
            );
        }
    }

    group.finish();
}

fn bench_thresholds(c: &mut Criterion) {
    let mut group = c.benchmark_group("thresholds");

    for &len in LENGTHS.iter() {
        let samples = synthetic_trace(len);
        group.throughput(Throughput::Elements(len as u64));

        for (name, spec) in [
            ("dynamic", ThresholdSpec::Dynamic),
            ("median", ThresholdSpec::Median),
        ] {
            group.bench_with_input(BenchmarkId::new(name, len), &samples, |b, samples| {
                b.iter(|| black_box(compute_thresholds(black_box(samples), &spec)));
            });
        }
    }

    group.finish();
}

fn bench_peaks_and_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("peaks_and_grouping");
    let repetitive = RepetitiveConfig {
        iti: 2600.0,
        pulse_num: 40,
    };

    for &len in LENGTHS.iter() {
        let samples = synthetic_trace(len);
        let membership = Membership::Above(1000.0);
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(len),
            &samples,
            |b, samples| {
                b.iter(|| {
                    let candidates: Vec<_> =
                        detect_peaks(black_box(samples), &membership, 0).collect();
                    black_box(group_pulses(
                        &candidates,
                        GroupingMode::Repetitive(&repetitive),
                        "TMS",
                        SRATE,
                    ))
                });
            },
        );
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    let config = FindPulseConfig {
        repetitive: Some(RepetitiveConfig {
            iti: 2600.0,
            pulse_num: 40,
        }),
        ..FindPulseConfig::default()
    };
    let finder = PulseFinder::new(config).unwrap();

    for &len in LENGTHS.iter() {
        let samples = synthetic_trace(len);
        let trace = Trace::new(&samples, SRATE).unwrap();
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(len), &trace, |b, trace| {
            b.iter(|| black_box(finder.run(black_box(trace))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_detrend,
    bench_thresholds,
    bench_peaks_and_grouping,
    bench_full_pipeline,
);
criterion_main!(benches);
