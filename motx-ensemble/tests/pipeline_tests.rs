//! End-to-end pipeline tests with mock backends and a mock registry

mod helpers;

use helpers::*;
use std::time::Duration;

use motx_ensemble::error::EnsembleError;
use motx_ensemble::pipeline::ProcessOptions;
use motx_ensemble::review::ReviewReason;
use motx_ensemble::types::Field;

#[tokio::test]
async fn test_agreeing_backends_with_matching_registry() {
    let registry = MockRegistry::new(RegistryBehaviour::Found(matching_vehicle()));
    let pipeline = pipeline(agreeing_backends(0.95), lookup(&registry), Duration::from_secs(5));

    let result = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(registry.calls(), 1);
    assert_eq!(result.models_used, vec![CLAUDE, GPT, GEMINI]);
    assert!(!result.requires_manual_review);

    let check = result.registry_validation.as_ref().unwrap();
    assert!(check.is_valid);
    assert!(check.field_matches[&Field::Make]);
    assert!(check.field_matches[&Field::Model]);
    assert!(check.field_matches[&Field::MotExpiry]);
    assert!(result.validation_results["registry_match"]);
    assert!(result.validation_results["registry_mot_expiry"]);
}

#[tokio::test]
async fn test_failing_backend_is_excluded() {
    let backends = vec![
        MockBackend::returning(full_result(CLAUDE, 0.95)).shared(),
        MockBackend::failing(GPT).shared(),
        MockBackend::returning(full_result(GEMINI, 0.95)).shared(),
    ];
    let pipeline = pipeline(backends, None, Duration::from_secs(5));

    let result = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(result.models_used, vec![CLAUDE, GEMINI]);
    assert_eq!(result.individual_results.len(), 2);
    assert!(result.registry_validation.is_none());
}

#[tokio::test]
async fn test_slow_backend_fails_whole_request() {
    let backends = vec![
        MockBackend::returning(full_result(CLAUDE, 0.95)).shared(),
        MockBackend::returning(full_result(GPT, 0.95))
            .with_delay(Duration::from_secs(30))
            .shared(),
    ];
    let pipeline = pipeline(backends, None, Duration::from_millis(100));

    let outcome = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await;
    assert!(matches!(outcome, Err(EnsembleError::Timeout(_))));
}

#[tokio::test]
async fn test_every_backend_failing() {
    let backends = vec![MockBackend::failing(CLAUDE).shared(), MockBackend::failing(GPT).shared()];
    let pipeline = pipeline(backends, None, Duration::from_secs(5));

    let outcome = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await;
    assert!(matches!(outcome, Err(EnsembleError::NoSuccessfulExtractions)));
}

#[tokio::test]
async fn test_registry_error_forces_review() {
    let registry = MockRegistry::new(RegistryBehaviour::Error);
    let pipeline = pipeline(agreeing_backends(0.95), lookup(&registry), Duration::from_secs(5));

    let result = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(registry.calls(), 1);
    assert!(result.requires_manual_review);
    let check = result.registry_validation.as_ref().unwrap();
    assert!(!check.is_valid);
    assert!(check.error_message.as_deref().unwrap().contains("registry down"));
    assert!(result
        .review_reasons
        .iter()
        .any(|reason| matches!(reason, ReviewReason::RegistryCheckFailed { .. })));
}

#[tokio::test]
async fn test_vehicle_not_in_registry_forces_review() {
    let registry = MockRegistry::new(RegistryBehaviour::NotFound);
    let pipeline = pipeline(agreeing_backends(0.95), lookup(&registry), Duration::from_secs(5));

    let result = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await
        .unwrap();

    assert!(result.requires_manual_review);
    assert!(!result.validation_results["registry_match"]);
}

#[tokio::test]
async fn test_registry_skipped_without_registration() {
    let registry = MockRegistry::new(RegistryBehaviour::Found(matching_vehicle()));
    let backends = vec![MockBackend::returning(result_with(
        GPT,
        &[(Field::MotExpiry, "15/03/2025", 0.9)],
    ))
    .shared()];
    let pipeline = pipeline(backends, lookup(&registry), Duration::from_secs(5));

    let result = pipeline
        .process_image(png_image(), &ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(registry.calls(), 0);
    assert!(result.registry_validation.is_none());
    assert!(matches!(
        &result.review_reasons[0],
        ReviewReason::MissingRequiredFields { fields } if fields == &vec![Field::Registration]
    ));
}

#[tokio::test]
async fn test_request_threshold_overrides_default() {
    let pipeline = pipeline(
        vec![MockBackend::returning(full_result(GPT, 0.5)).shared()],
        None,
        Duration::from_secs(5),
    );
    let options = ProcessOptions {
        validate_with_registry: false,
        confidence_threshold: Some(0.5),
    };

    let result = pipeline.process_image(png_image(), &options).await.unwrap();
    assert!(!result.requires_manual_review);
    assert!(result.processing_time >= 0.0);
}
