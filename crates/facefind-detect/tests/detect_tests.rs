use facefind_core::traits::FaceDetector;
use facefind_detect::HashingDetector;

#[test]
fn hashing_detector_is_deterministic_and_normalized() {
    let det = HashingDetector::new(128);
    let image: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
    let a = det.detect(&image).expect("detect");
    let b = det.detect(&image).expect("detect");
    assert_eq!(a.len(), 1, "one face per non-empty image");
    assert_eq!(a, b);

    let v = a[0].embedding.as_slice();
    assert_eq!(v.len(), 128);
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "norm={norm}");
}

#[test]
fn empty_image_has_no_face() {
    let det = HashingDetector::new(16);
    assert!(det.detect(&[]).expect("detect").is_empty());
}

#[test]
fn different_images_give_different_embeddings() {
    let det = HashingDetector::new(1024);
    let a = det.detect(b"first image bytes, long enough to span windows ...................................").expect("detect");
    let b = det.detect(b"another picture entirely").expect("detect");
    assert_ne!(a[0].embedding, b[0].embedding);
}
