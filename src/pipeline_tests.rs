// In: src/pipeline_tests.rs

//! End-to-end scenarios: chunked execution against single-pass execution, and
//! checkpoint/resume across independently constructed pipelines.

use super::*;
use crate::compose::{State, INPUT};
use crate::config::{CheckpointConfig, StateCompression};
use crate::kernels::iir::{butter_sos, sosfilt, BandType};
use crate::kwargs;
use proptest::prelude::*;

//==============================================================================
// 1. Helpers
//==============================================================================

fn dataset() -> DataArray {
    synthetics::generate(600, 5, 1234).expect("synthetic data")
}

/// Feeds every chunk through `node` in order and joins the outputs.
fn run_chunked<F>(data: &DataArray, n_chunks: usize, mut apply: F) -> DataArray
where
    F: FnMut(Value) -> Result<Value>,
{
    let parts: Vec<DataArray> = data
        .chunk(n_chunks, "time")
        .expect("chunking failed")
        .into_iter()
        .map(|c| apply(Value::from(c)).and_then(Value::into_data).expect("apply failed"))
        .collect();
    DataArray::concatenate(&parts, "time").expect("concatenation failed")
}

/// Reference result computed directly with the kernels, outside any atom.
fn reference_lowpass(data: &DataArray) -> DataArray {
    let sos = butter_sos(4, 10.0, BandType::Lowpass, 50.0).unwrap();
    let (y, _) = sosfilt(&sos, data.values(), 0, None).unwrap();
    data.with_values(y).unwrap()
}

//==============================================================================
// 2. Stateful filtering
//==============================================================================

#[test]
fn test_lowpass_six_chunks_equals_single_pass() {
    let data = dataset();
    let expected = reference_lowpass(&data);

    let mut monolithic = signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap();
    let single = monolithic.apply(Value::from(data.clone())).unwrap().into_data().unwrap();
    assert_eq!(single, expected);

    let mut chunked = signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap();
    let joined = run_chunked(&data, 6, |chunk| chunked.apply(chunk));
    assert_eq!(joined, expected);
}

#[test]
fn test_fresh_atom_per_chunk_breaks_equivalence() {
    let data = dataset();
    let expected = reference_lowpass(&data);
    let joined = run_chunked(&data, 6, |chunk| {
        signal::iir_filter(4, 10.0, "lowpass", 50.0, "time")?.apply(chunk)
    });
    assert_ne!(joined, expected);
}

#[test]
fn test_checkpoint_after_third_chunk_resumes_exactly() {
    let data = dataset();
    let expected = reference_lowpass(&data);
    let chunks = data.chunk(6, "time").unwrap();

    let mut first = signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap();
    let mut parts = Vec::new();
    for chunk in &chunks[..3] {
        parts.push(first.apply(Value::from(chunk.clone())).unwrap().into_data().unwrap());
    }
    let mut checkpoint = Vec::new();
    first.save_state(&mut checkpoint).unwrap();
    drop(first);

    let mut second = signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap();
    second.load_state(checkpoint.as_slice()).unwrap();
    for chunk in &chunks[3..] {
        parts.push(second.apply(Value::from(chunk.clone())).unwrap().into_data().unwrap());
    }

    assert_eq!(DataArray::concatenate(&parts, "time").unwrap(), expected);
}

#[test]
fn test_checkpoint_file_with_compression() {
    let data = dataset();
    let chunks = data.chunk(4, "time").unwrap();
    let config = CheckpointConfig {
        compression: StateCompression::Zstd { level: 3 },
        ..CheckpointConfig::default()
    };
    let path = std::env::temp_dir().join(format!("atomflow_state_{}.afst", std::process::id()));

    let mut a = signal::iir_filter(3, 5.0, "highpass", 50.0, "time").unwrap();
    let mut b = signal::iir_filter(3, 5.0, "highpass", 50.0, "time").unwrap();
    a.apply(Value::from(chunks[0].clone())).unwrap();
    a.save_state_file(&path, &config).unwrap();
    b.load_state_file(&path, &config).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(a.states(), b.states());
    assert_eq!(
        a.apply(Value::from(chunks[1].clone())).unwrap(),
        b.apply(Value::from(chunks[1].clone())).unwrap()
    );
}

#[test]
fn test_reset_rewinds_to_fresh_behaviour() {
    let data = dataset();
    let mut atom = signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap();
    let first = run_chunked(&data, 3, |chunk| atom.apply(chunk));
    atom.reset();
    assert_eq!(atom.state("zi"), Some(&State::Uninitialized));
    let second = run_chunked(&data, 3, |chunk| atom.apply(chunk));
    assert_eq!(first, second);
}

//==============================================================================
// 3. Sequences
//==============================================================================

#[test]
fn test_scale_square_mean_sequence_matches_manual() {
    let data = dataset();
    let mut seq = Sequence::new(vec![
        Node::from(signal::scale().atom(vec![INPUT, Arg::from(3.0)], Kwargs::new()).unwrap()),
        Node::from(signal::square().atom(vec![INPUT], Kwargs::new()).unwrap()),
        Node::from(
            signal::mean()
                .atom(vec![INPUT], kwargs! { "dim" => "time" })
                .unwrap(),
        ),
    ]);
    let result = seq.apply(Value::from(data.clone())).unwrap().into_data().unwrap();

    let manual = data
        .values()
        .mapv(|v| (3.0 * v) * (3.0 * v))
        .mean_axis(ndarray::Axis(0))
        .unwrap();
    assert_eq!(result.values(), &manual);
    assert_eq!(result.dims(), &["distance".to_string()]);
}

#[test]
fn test_mixed_sequence_chunked_with_tree_checkpoint() {
    let build = || {
        Sequence::named(
            "preprocess",
            vec![
                Node::from(signal::abs().atom(vec![INPUT], Kwargs::new()).unwrap()),
                Node::from(signal::iir_filter(2, 4.0, "lowpass", 50.0, "time").unwrap()),
                Node::from(Sequence::new(vec![
                    Node::from(signal::down_sample(3, "time").unwrap()),
                    Node::from(signal::up_sample(2, "time").unwrap()),
                ])),
            ],
        )
    };
    let data = dataset();
    let expected = build().apply(Value::from(data.clone())).unwrap().into_data().unwrap();

    let chunks = data.chunk(5, "time").unwrap();
    let mut head = build();
    let mut parts = Vec::new();
    for chunk in &chunks[..2] {
        parts.push(head.apply(Value::from(chunk.clone())).unwrap().into_data().unwrap());
    }
    let bytes = head.export_state(&CheckpointConfig::default()).unwrap();

    let mut tail = build();
    tail.import_state(&bytes, &CheckpointConfig::default()).unwrap();
    for chunk in &chunks[2..] {
        parts.push(tail.apply(Value::from(chunk.clone())).unwrap().into_data().unwrap());
    }
    assert_eq!(DataArray::concatenate(&parts, "time").unwrap(), expected);

    let paths: Vec<String> = tail.stateful_atoms().into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, vec!["1".to_string(), "2.0".to_string()]);
}

#[test]
fn test_construction_errors_surface_before_apply() {
    assert!(matches!(
        signal::scale().atom(vec![INPUT, INPUT], Kwargs::new()),
        Err(ComposeError::Argument(_))
    ));
    assert!(matches!(
        signal::sosfilt().stateful(vec![INPUT], Kwargs::new(), "state"),
        Err(ComposeError::Argument(_))
    ));
    assert!(matches!(
        Atom::new(Callable::unary("id", Ok), vec![Arg::from(1i64)], Kwargs::new()),
        Err(ComposeError::Argument(_))
    ));
}

//==============================================================================
// 4. Property: pure sequences are chunk-transparent
//==============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pure_sequence_equals_chunked(
        n_time in 1usize..80,
        n_distance in 1usize..4,
        n_chunks in 1usize..10,
        factor in -4.0f64..4.0,
        seed in any::<u64>(),
    ) {
        let n_chunks = n_chunks.min(n_time);
        let data = synthetics::generate(n_time, n_distance, seed).unwrap();
        let seq = Sequence::new(vec![
            Node::from(signal::scale().atom(vec![INPUT, Arg::from(factor)], Kwargs::new()).unwrap()),
            Node::from(signal::abs().atom(vec![INPUT], Kwargs::new()).unwrap()),
            Node::from(signal::up_sample(2, "time").unwrap()),
        ]);

        let monolithic = seq.clone().apply(Value::from(data.clone())).unwrap().into_data().unwrap();
        let mut chunked_seq = seq;
        let chunked = run_chunked(&data, n_chunks, |c| chunked_seq.apply(c));
        prop_assert_eq!(chunked, monolithic);
    }
}
