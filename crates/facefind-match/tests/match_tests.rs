use facefind_core::config::{MatchingConfig, MetricKind};
use facefind_core::error::FaceError;
use facefind_core::types::EmbeddingRecord;
use facefind_match::{find_best, metric_from_config, Cosine, EuclideanFalloff, Similarity};

fn rec(name: &str, v: &[f32]) -> EmbeddingRecord {
    EmbeddingRecord::new(name, format!("{name}.jpg"), v.to_vec())
}

#[test]
fn near_duplicate_matches_and_orthogonal_does_not() {
    let db = vec![rec("Alice", &[1.0, 0.0, 0.0])];
    let hit = find_best(&[0.99, 0.01, 0.0], &db, 0.4, &Cosine).unwrap();
    assert_eq!(hit.name, "Alice");
    assert_eq!(hit.source, "Alice.jpg");
    assert!(hit.similarity > 0.99, "similarity={}", hit.similarity);

    let miss = find_best(&[0.0, 0.0, 1.0], &db, 0.4, &Cosine).unwrap();
    assert!(!miss.is_match());
    assert_eq!(miss.similarity, 0.0);
}

#[test]
fn result_is_never_below_threshold() {
    let db = vec![
        rec("a", &[1.0, 0.0, 0.0]),
        rec("b", &[0.7, 0.7, 0.0]),
        rec("c", &[0.2, 0.3, 0.9]),
        rec("d", &[-1.0, 0.0, 0.0]),
    ];
    let queries: [[f32; 3]; 4] = [[1.0, 0.1, 0.0], [0.0, 1.0, 0.0], [0.3, 0.3, 0.3], [0.0, 0.0, -1.0]];
    for t in [0.0f32, 0.1, 0.4, 0.55, 0.8, 0.95, 1.0] {
        for q in &queries {
            let r = find_best(q, &db, t, &Cosine).unwrap();
            assert!(r.similarity == 0.0 || r.similarity >= t, "t={t} q={q:?} got {r:?}");
            assert!((0.0..=1.0).contains(&r.similarity));
        }
    }
}

#[test]
fn first_candidate_wins_ties_and_results_are_deterministic() {
    let db = vec![rec("first", &[0.0, 1.0]), rec("second", &[0.0, 1.0]), rec("third", &[1.0, 0.0])];
    let a = find_best(&[0.0, 2.0], &db, 0.5, &Cosine).unwrap();
    for _ in 0..10 {
        assert_eq!(find_best(&[0.0, 2.0], &db, 0.5, &Cosine).unwrap(), a);
    }
    assert_eq!(a.name, "first");
}

#[test]
fn highest_score_wins_regardless_of_position() {
    let db = vec![rec("far", &[0.0, 1.0]), rec("near", &[1.0, 0.05])];
    assert_eq!(find_best(&[1.0, 0.0], &db, 0.4, &Cosine).unwrap().name, "near");
}

#[test]
fn empty_collection_is_no_match() {
    let r = find_best(&[1.0, 0.0], &[], 0.0, &Cosine).unwrap();
    assert!(!r.is_match());
}

#[test]
fn dimension_mismatch_is_reported() {
    let db = vec![rec("a", &[1.0, 0.0, 0.0])];
    let err = find_best(&[1.0, 0.0], &db, 0.4, &Cosine).unwrap_err();
    assert!(matches!(err, FaceError::DimensionMismatch { expected: 3, actual: 2 }));
    let err = find_best(&[], &db, 0.4, &Cosine).unwrap_err();
    assert!(matches!(err, FaceError::DimensionMismatch { expected: 3, actual: 0 }));
}

#[test]
fn euclidean_falloff_scores_identity_as_one_and_decays_with_distance() {
    let m = EuclideanFalloff::default();
    assert_eq!(m.similarity(&[0.1, 0.2], &[0.1, 0.2]), 1.0);
    let near = m.similarity(&[0.0, 0.0], &[0.1, 0.0]);
    let far = m.similarity(&[0.0, 0.0], &[1.0, 0.0]);
    assert!(near > far);
    assert!((near - 0.95).abs() < 1e-6);
    assert_eq!(m.similarity(&[0.0], &[10.0]), 0.0);
}

#[test]
fn cosine_of_zero_vector_is_zero() {
    assert_eq!(Cosine.similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn metric_follows_config() {
    let mut cfg = MatchingConfig::default();
    assert_eq!(metric_from_config(&cfg).name(), "cosine");
    cfg.metric = MetricKind::Euclidean;
    assert_eq!(metric_from_config(&cfg).name(), "euclidean");
}

#[test]
fn cosine_does_not_depend_on_vector_scale() {
    let tiny = [3e-4f32, 0.0, 0.0];
    assert!((Cosine.similarity(&tiny, &tiny) - 1.0).abs() < 1e-6);
    let tinier = [1e-20f32, 2e-20, 0.0];
    assert!((Cosine.similarity(&tinier, &[1.0, 2.0, 0.0]) - 1.0).abs() < 1e-6);

    let db = vec![rec("Alice", &tiny)];
    let hit = find_best(&tiny, &db, 0.55, &Cosine).unwrap();
    assert_eq!(hit.name, "Alice");
}

#[test]
fn non_finite_query_is_rejected() {
    let db = vec![rec("Alice", &[1.0, 0.0, 0.0])];
    for q in [[f32::NAN, 0.0, 0.0], [0.0, f32::INFINITY, 0.0], [0.0, 0.0, f32::NEG_INFINITY]] {
        let err = find_best(&q, &db, 0.4, &Cosine).unwrap_err();
        assert!(matches!(err, FaceError::MalformedQuery(_)), "{q:?} gave {err:?}");
    }
    // rejected even with nothing to compare against
    assert!(matches!(find_best(&[f32::NAN], &[], 0.4, &Cosine), Err(FaceError::MalformedQuery(_))));
}
