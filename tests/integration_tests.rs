//! Integration tests for sumset.

use std::io::Cursor;

use sumset::{
    apply_ops, peek_magic, weak_sum, write_ops, MatchEvent, MatchOp, Matcher, RollingChecksum,
    RolloutVariant, SignatureBuilder, SignatureConfig, SignatureIndex, SignatureMagic,
    SignatureSet, StrongSum, SumsetError, SIGNATURE_HEADER_LEN,
};

fn sample(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

/// Generate, serialize, parse, index, scan and rebuild.
fn roundtrip(config: &SignatureConfig, reference: &[u8], new_data: &[u8]) -> Vec<MatchOp> {
    let signature = SignatureSet::generate(config, reference).unwrap();
    let bytes = signature.to_bytes().unwrap();
    let parsed = SignatureSet::from_bytes(&bytes)
        .unwrap()
        .with_rollout(config.effective_rollout());
    assert_eq!(parsed, signature);

    let index = SignatureIndex::build(&parsed).unwrap();
    let (ops, stats) = Matcher::new(&index).collect_ops(new_data);
    assert_eq!(
        stats.matched_bytes + stats.literal_bytes,
        new_data.len() as u64
    );
    assert_eq!(apply_ops(reference, &ops).unwrap(), new_data);
    ops
}

// =============================================================================
// END-TO-END MATCHING
// =============================================================================

#[test]
fn identical_blob_is_one_copy() {
    let data = sample(64 * 1024, 1);
    let config = SignatureBuilder::new().block_len(1024).build().unwrap();
    let ops = roundtrip(&config, &data, &data);
    assert_eq!(
        ops,
        vec![MatchOp::Copy {
            offset: 0,
            len: 64 * 1024
        }]
    );
}

#[test]
fn edited_blob_reuses_untouched_blocks() {
    let reference = sample(32 * 1024, 2);
    let mut new_data = reference.clone();
    new_data[5000] ^= 0x55;
    new_data.splice(20_000..20_000, b"inserted text".iter().copied());
    new_data.drain(28_000..28_100);

    let config = SignatureBuilder::new()
        .block_len(512)
        .strong_sum_len(12)
        .build()
        .unwrap();
    let ops = roundtrip(&config, &reference, &new_data);

    let copied: u64 = ops
        .iter()
        .filter_map(|op| match op {
            MatchOp::Copy { len, .. } => Some(*len),
            MatchOp::Literal(_) => None,
        })
        .sum();
    assert!(copied > 28 * 1024, "only {copied} bytes copied");
}

#[test]
fn unrelated_blob_is_all_literal() {
    let reference = sample(8192, 3);
    let new_data = sample(8192, 4);
    let config = SignatureBuilder::new().block_len(256).build().unwrap();
    let ops = roundtrip(&config, &reference, &new_data);
    assert_eq!(ops, vec![MatchOp::Literal(new_data)]);
}

#[test]
fn md4_signature_roundtrip() {
    let reference = sample(10_000, 5);
    let config = SignatureBuilder::new()
        .magic(SignatureMagic::Md4)
        .block_len(700)
        .build()
        .unwrap();

    let signature = SignatureSet::generate(&config, &reference).unwrap();
    assert_eq!(signature.strong_sum_len(), 16);
    assert_eq!(signature.rollout(), RolloutVariant::Legacy);

    let bytes = signature.to_bytes().unwrap();
    assert_eq!(peek_magic(&bytes).unwrap(), SignatureMagic::Md4);
    assert_eq!(bytes.len(), SIGNATURE_HEADER_LEN + 15 * 20);

    roundtrip(&config, &reference, &reference);
}

#[test]
fn md4_default_finds_shifted_blocks() {
    let reference = sample(4096, 6);
    let mut new_data = b"prefix".to_vec();
    new_data.extend_from_slice(&reference);

    let config = SignatureBuilder::new()
        .magic(SignatureMagic::Md4)
        .block_len(512)
        .build()
        .unwrap();
    assert_eq!(config.effective_rollout(), RolloutVariant::Legacy);
    let ops = roundtrip(&config, &reference, &new_data);
    assert_eq!(
        ops,
        vec![
            MatchOp::Literal(b"prefix".to_vec()),
            MatchOp::Copy {
                offset: 0,
                len: 4096
            }
        ]
    );
}

#[test]
fn rolled_weak_sums_match_generated_blocks() {
    let reference = sample(3000, 7);
    let config = SignatureBuilder::new().block_len(100).build().unwrap();
    let signature = SignatureSet::generate(&config, &reference).unwrap();

    let mut sum = RollingChecksum::with_variant(signature.rollout());
    sum.update(&reference[..100]);
    for start in 0..2900 {
        if start % 100 == 0 {
            let block = signature.block(start / 100).unwrap();
            assert_eq!(sum.digest(), block.weak_sum);
        }
        assert_eq!(sum.digest(), weak_sum(&reference[start..start + 100]));
        sum.rotate(reference[start], reference[start + 100]);
    }
}

#[test]
fn scan_events_cover_input_in_order() {
    let reference = sample(2048, 8);
    let config = SignatureBuilder::new().block_len(128).build().unwrap();
    let signature = SignatureSet::generate(&config, &reference).unwrap();
    let index = SignatureIndex::build(&signature).unwrap();

    let mut new_data = reference[1000..].to_vec();
    new_data.extend_from_slice(b"--");
    new_data.extend_from_slice(&reference[..1000]);

    let mut next_offset = 0u64;
    Matcher::new(&index).scan(&new_data, |event| match event {
        MatchEvent::Block { offset, len, .. } => {
            assert_eq!(offset, next_offset);
            next_offset += len as u64;
        }
        MatchEvent::Literal(_) => next_offset += 1,
    });
    assert_eq!(next_offset, new_data.len() as u64);
}

#[test]
fn write_ops_streams_output() {
    let reference = sample(4096, 9);
    let config = SignatureBuilder::new().block_len(256).build().unwrap();
    let signature = SignatureSet::generate(&config, &reference).unwrap();
    let index = SignatureIndex::build(&signature).unwrap();

    let new_data: Vec<u8> = reference.iter().rev().copied().collect();
    let (ops, _) = Matcher::new(&index).collect_ops(&new_data);

    let mut output = Cursor::new(Vec::new());
    write_ops(&reference, &ops, &mut output).unwrap();
    assert_eq!(output.into_inner(), new_data);
}

// =============================================================================
// SIGNATURE STREAMS
// =============================================================================

#[test]
fn stream_from_reader_and_writer() {
    let reference = sample(5000, 10);
    let config = SignatureBuilder::new()
        .block_len(333)
        .strong_sum_len(5)
        .build()
        .unwrap();
    let signature =
        SignatureSet::generate_from_reader(&config, &mut Cursor::new(&reference)).unwrap();

    let mut stream = Vec::new();
    signature.write_to(&mut stream).unwrap();
    let parsed = SignatureSet::read_from(&mut Cursor::new(&stream), 0).unwrap();

    assert_eq!(parsed.len(), 16);
    assert_eq!(parsed.block_len(), 333);
    assert_eq!(parsed.strong_sum_len(), 5);
    assert_eq!(
        parsed.block(2).unwrap().strong_sum,
        StrongSum::compute(SignatureMagic::Blake2, &reference[666..999]).truncated(5)
    );
}

#[test]
fn corrupted_streams_are_rejected() {
    let config = SignatureBuilder::new().block_len(64).build().unwrap();
    let signature = SignatureSet::generate(&config, &sample(640, 11)).unwrap();
    let bytes = signature.to_bytes().unwrap();

    let err = SignatureSet::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, SumsetError::Format(_)));
    assert!(err.is_recoverable());

    let mut bad = bytes.clone();
    bad[3] = 0x99;
    let err = SignatureSet::from_bytes(&bad).unwrap_err();
    assert!(matches!(err, SumsetError::BadMagic(0x7273_0199)));

    let err = SignatureSet::from_bytes(&bytes[..7]).unwrap_err();
    assert!(matches!(err, SumsetError::Format(_)));
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn config_serde_roundtrip() {
    let config = SignatureBuilder::new()
        .magic(SignatureMagic::Md4)
        .block_len(4096)
        .strong_sum_len(8)
        .rollout(RolloutVariant::Exact)
        .build()
        .unwrap();

    let encoded = bincode::serialize(&config).unwrap();
    let decoded: SignatureConfig = bincode::deserialize(&encoded).unwrap();
    assert_eq!(config, decoded);
    assert!(decoded.validate().is_ok());
}

#[test]
fn signature_set_from_config_is_presized() {
    let config = SignatureConfig::default();
    let set = SignatureSet::with_config(&config, 12 + 100 * 36).unwrap();
    assert_eq!(set.capacity(), 100);
    assert!(set.is_empty());
    assert_eq!(set.magic(), SignatureMagic::Blake2);
}
