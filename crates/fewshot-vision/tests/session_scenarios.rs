//! End-to-end session scenarios: readiness, training, classification, and
//! the correction loop, driven through the public API.

use image::{DynamicImage, Rgb, RgbImage};

use fewshot_vision::{
    CategorySpec, EmbeddingEngine, ExemplarMatcher, FeatureExtractor, FeatureVector, FewShotError,
    KnnClassifier, Session, SessionConfig, TrainingState,
};

// ─────────────────────── helpers ───────────────────────

fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([r, g, b])))
}

fn cat_image(i: usize) -> DynamicImage {
    [solid(250, 10, 10), solid(230, 30, 20), solid(240, 20, 40)][i % 3].clone()
}

fn dog_image(i: usize) -> DynamicImage {
    [solid(10, 10, 250), solid(20, 40, 230), solid(30, 20, 240)][i % 3].clone()
}

/// Purple: closer to the dog examples than the cat ones.
fn ambiguous_cat() -> DynamicImage {
    solid(120, 0, 200)
}

fn session_with(config: SessionConfig) -> Session {
    Session::new(EmbeddingEngine::fallback(), KnnClassifier::new(), config).unwrap()
}

fn pets_session() -> Session {
    let mut session = session_with(SessionConfig::default());
    session
        .define_categories(vec![
            CategorySpec::new("cat", "Cat", "🐱"),
            CategorySpec::new("dog", "Dog", "🐶"),
        ])
        .unwrap();
    session
}

fn ready_pets_session() -> Session {
    let mut session = pets_session();
    for i in 0..3 {
        session.add_example("cat", cat_image(i)).unwrap();
        session.add_example("dog", dog_image(i)).unwrap();
    }
    session
}

fn trained_pets_session() -> Session {
    let mut session = ready_pets_session();
    session.train(|_| {}).unwrap();
    session
}

// ═══════════════════════════════════════════════════════
// READINESS
// ═══════════════════════════════════════════════════════

#[test]
fn test_ready_with_two_categories_of_three() {
    let session = ready_pets_session();
    assert!(session.is_ready_to_train());
}

#[test]
fn test_not_ready_below_example_floor() {
    let mut session = ready_pets_session();
    session.remove_example_at("dog", 2).unwrap();
    assert!(!session.is_ready_to_train());
}

#[test]
fn test_not_ready_below_category_floor() {
    let mut session = ready_pets_session();
    session.remove_category("dog").unwrap();
    assert!(!session.is_ready_to_train());
}

#[test]
fn test_one_category_never_trains() {
    let lowered = SessionConfig {
        min_categories: 1,
        ..SessionConfig::default()
    };
    let result = Session::new(EmbeddingEngine::fallback(), KnnClassifier::new(), lowered);
    assert!(matches!(result, Err(FewShotError::InvalidConfig(_))));

    for min_categories in [2, 3] {
        let mut session = session_with(SessionConfig {
            min_categories,
            ..SessionConfig::default()
        });
        session
            .define_categories(vec![CategorySpec::new("cat", "Cat", "🐱")])
            .unwrap();
        for i in 0..3 {
            session.add_example("cat", cat_image(i)).unwrap();
        }
        assert!(!session.is_ready_to_train());
        assert!(matches!(session.train(|_| {}), Err(FewShotError::NotReady(_))));
        assert_eq!(session.matcher().exemplar_count(), 0);
    }
}

#[test]
fn test_positional_remove_then_readd() {
    let mut session = ready_pets_session();
    let before: Vec<_> = session
        .registry()
        .get("cat")
        .unwrap()
        .examples
        .iter()
        .map(|e| e.id)
        .collect();

    session.remove_example_at("cat", 0).unwrap();
    let cat = session.registry().get("cat").unwrap();
    assert_eq!(cat.examples[0].id, before[1]);
    assert_eq!(cat.examples[1].id, before[2]);
    assert!(!session.is_ready_to_train());

    session.add_example("cat", cat_image(0)).unwrap();
    assert!(session.is_ready_to_train());
}

#[test]
fn test_remove_out_of_range() {
    let mut session = ready_pets_session();
    let err = session.remove_example_at("cat", 3).unwrap_err();
    assert!(matches!(err, FewShotError::IndexOutOfRange { .. }));
}

// ═══════════════════════════════════════════════════════
// TRAINING
// ═══════════════════════════════════════════════════════

#[test]
fn test_train_not_ready_fails() {
    let mut session = pets_session();
    session.add_example("cat", cat_image(0)).unwrap();

    let err = session.train(|_| {}).unwrap_err();
    assert!(matches!(err, FewShotError::NotReady(_)));
    assert_eq!(session.state(), TrainingState::Untrained);
    assert_eq!(session.matcher().exemplar_count(), 0);
}

#[test]
fn test_train_reports_progress_to_completion() {
    let mut session = ready_pets_session();
    let mut percents = Vec::new();

    let summary = session.train(|p| percents.push(p.percent())).unwrap();

    assert_eq!(session.state(), TrainingState::Trained);
    assert_eq!(summary.exemplars_added, 6);
    assert_eq!(percents.len(), 6);
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert!((percents[5] - 100.0).abs() < 1e-4);
}

#[test]
fn test_training_failure_reverts_state() {
    struct FlakyExtractor {
        inner: EmbeddingEngine,
        remaining: usize,
    }

    impl FeatureExtractor for FlakyExtractor {
        fn extract(
            &mut self,
            image: &DynamicImage,
        ) -> Result<FeatureVector, fewshot_vision::ExtractionError> {
            if self.remaining == 0 {
                return Err(fewshot_vision::ExtractionError::Model("model crashed".into()));
            }
            self.remaining -= 1;
            self.inner.extract(image)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    let extractor = FlakyExtractor {
        inner: EmbeddingEngine::fallback(),
        remaining: 2,
    };
    let mut session =
        Session::new(extractor, KnnClassifier::new(), SessionConfig::default()).unwrap();
    session
        .define_categories(vec![
            CategorySpec::new("cat", "Cat", "🐱"),
            CategorySpec::new("dog", "Dog", "🐶"),
        ])
        .unwrap();
    for i in 0..3 {
        session.add_example("cat", cat_image(i)).unwrap();
        session.add_example("dog", dog_image(i)).unwrap();
    }

    let err = session.train(|_| {}).unwrap_err();
    assert!(matches!(err, FewShotError::TrainingFailed { .. }));
    assert_eq!(session.state(), TrainingState::Untrained);
    // No rollback of what was already added.
    assert_eq!(session.matcher().exemplar_count(), 2);
    assert!(matches!(session.classify(cat_image(0)), Err(FewShotError::NotTrained)));
}

#[test]
fn test_adding_examples_after_training_does_not_retrain() {
    let mut session = trained_pets_session();
    session.add_example("cat", cat_image(1)).unwrap();
    assert_eq!(session.state(), TrainingState::Trained);
    assert_eq!(session.matcher().exemplar_count(), 6);
}

// ═══════════════════════════════════════════════════════
// CLASSIFICATION & FEEDBACK
// ═══════════════════════════════════════════════════════

#[test]
fn test_classify_before_training_fails() {
    let mut session = ready_pets_session();
    let err = session.classify(cat_image(0)).unwrap_err();
    assert!(matches!(err, FewShotError::NotTrained));
}

#[test]
fn test_classify_after_training() {
    let mut session = trained_pets_session();
    let prediction = session.classify(solid(245, 15, 15)).unwrap();

    let id = prediction.predicted_category_id.as_deref().unwrap();
    assert!(id == "cat" || id == "dog");
    assert_eq!(id, "cat");
    assert!((0.0..=1.0).contains(&prediction.confidence));
}

#[test]
fn test_correct_without_classify_fails() {
    let mut session = trained_pets_session();
    let err = session.correct("cat").unwrap_err();
    assert!(matches!(err, FewShotError::NoPendingTest));
}

#[test]
fn test_correct_unknown_category_fails() {
    let mut session = trained_pets_session();
    session.classify(ambiguous_cat()).unwrap();
    let err = session.correct("bird").unwrap_err();
    assert!(matches!(err, FewShotError::UnknownCategory(_)));
    assert!(session.has_pending_test());
}

#[test]
fn test_second_correction_fails() {
    let mut session = trained_pets_session();
    session.classify(ambiguous_cat()).unwrap();
    session.correct("cat").unwrap();
    let err = session.correct("cat").unwrap_err();
    assert!(matches!(err, FewShotError::NoPendingTest));
}

#[test]
fn test_affirm_is_idempotent() {
    let mut session = trained_pets_session();
    let prediction = session.classify(dog_image(0)).unwrap();
    let exemplars = session.matcher().exemplar_count();
    let examples = session.registry().total_examples();

    assert_eq!(session.affirm(), Some(&prediction));
    assert_eq!(session.affirm(), Some(&prediction));

    assert_eq!(session.matcher().exemplar_count(), exemplars);
    assert_eq!(session.registry().total_examples(), examples);
}

#[test]
fn test_correction_scenario() {
    let mut session = trained_pets_session();

    let before = session.classify(ambiguous_cat()).unwrap();
    assert_eq!(before.predicted_category_id.as_deref(), Some("dog"));

    let correction = session.correct("cat").unwrap();
    assert_eq!(correction.exemplars_added, 3);
    assert_eq!(session.matcher().exemplar_count_for("cat"), 6);
    assert_eq!(session.registry().get("cat").unwrap().example_count(), 4);
    assert!(!session.has_pending_test());

    let after = session.classify(ambiguous_cat()).unwrap();
    assert_eq!(after.predicted_category_id.as_deref(), Some("cat"));
    assert!(after.confidence >= before.confidences.get("cat").copied().unwrap_or(0.0));
}

#[test]
fn test_correction_weight_is_configurable() {
    let mut session = session_with(SessionConfig {
        correction_weight: 5,
        ..SessionConfig::default()
    });
    session
        .define_categories(vec![
            CategorySpec::new("cat", "Cat", "🐱"),
            CategorySpec::new("dog", "Dog", "🐶"),
        ])
        .unwrap();
    for i in 0..3 {
        session.add_example("cat", cat_image(i)).unwrap();
        session.add_example("dog", dog_image(i)).unwrap();
    }
    session.train(|_| {}).unwrap();

    session.classify(ambiguous_cat()).unwrap();
    session.correct("cat").unwrap();
    assert_eq!(session.matcher().exemplar_count_for("cat"), 8);
}

#[test]
fn test_removed_category_predicts_unknown() {
    let mut session = trained_pets_session();
    session.remove_category("dog").unwrap();

    let prediction = session.classify(dog_image(0)).unwrap();
    assert!(prediction.is_unknown());
    // The orphaned exemplars are still there.
    assert_eq!(session.matcher().exemplar_count_for("dog"), 3);
}

// ═══════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════

#[test]
fn test_reset_returns_to_empty() {
    let mut session = trained_pets_session();
    session.classify(cat_image(0)).unwrap();

    session.reset();

    assert_eq!(session.state(), TrainingState::Untrained);
    assert!(session.registry().is_empty());
    assert_eq!(session.matcher().exemplar_count(), 0);
    assert!(!session.has_pending_test());
    assert!(matches!(session.classify(cat_image(0)), Err(FewShotError::NotTrained)));
}

#[test]
fn test_define_after_reset_reuses_ids() {
    let mut session = trained_pets_session();
    session.reset();
    session
        .define_categories(vec![CategorySpec::new("cat", "Cat", "🐱")])
        .unwrap();
    assert!(session.registry().contains("cat"));
}

#[test]
fn test_duplicate_definition_rejected() {
    let mut session = pets_session();
    let err = session
        .define_categories(vec![CategorySpec::new("cat", "Another cat", "😺")])
        .unwrap_err();
    assert!(matches!(err, FewShotError::DuplicateCategory(_)));
}

#[test]
fn test_template_session() {
    let template = fewshot_vision::find_template("happy-sad").unwrap();
    let session = Session::with_template(
        EmbeddingEngine::fallback(),
        KnnClassifier::new(),
        SessionConfig::default(),
        template,
    )
    .unwrap();

    let ids: Vec<&str> = session.registry().categories().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["happy", "sad"]);
    assert!(!session.is_ready_to_train());
}

// ═══════════════════════════════════════════════════════
// BULK UPLOAD
// ═══════════════════════════════════════════════════════

#[test]
fn test_bulk_upload_skips_non_images() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("cat{i}.png"));
        RgbImage::from_pixel(8, 8, Rgb([250, 10 * i as u8, 10])).save(&path).unwrap();
        paths.push(path);
    }
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").unwrap();
    paths.push(notes);
    let broken = dir.path().join("broken.jpg");
    std::fs::write(&broken, b"\x00\x01").unwrap();
    paths.push(broken);

    let mut session = pets_session();
    let report = session.add_examples_from_files("cat", &paths).unwrap();

    assert_eq!(report.added.len(), 3);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(session.registry().get("cat").unwrap().example_count(), 3);
}

#[test]
fn test_bulk_upload_unknown_category() {
    let mut session = pets_session();
    let err = session
        .add_examples_from_files("bird", Vec::<std::path::PathBuf>::new())
        .unwrap_err();
    assert!(matches!(err, FewShotError::UnknownCategory(_)));
}
