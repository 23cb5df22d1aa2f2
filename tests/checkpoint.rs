mod common;

use common::{factor_checkpoint, ScalingFsPredictor, ScalingPredictor};
use scoreflow_core::checkpoint::Checkpoint;
use scoreflow_core::{BatchPredictor, Dataset, PredictOptions};
use serde_json::json;

#[tokio::test]
async fn test_memory_and_directory_predictors_agree() {
    let checkpoint = factor_checkpoint(2.0);
    let dataset = Dataset::from_items([1.0, 2.0, 3.0, 4.0]);

    let in_memory = BatchPredictor::from_checkpoint::<ScalingPredictor>(checkpoint.clone())
        .predict(dataset.clone(), &PredictOptions::default())
        .await
        .unwrap();
    let via_directory = BatchPredictor::from_checkpoint::<ScalingFsPredictor>(checkpoint)
        .predict(dataset, &PredictOptions::default())
        .await
        .unwrap();

    assert_eq!(in_memory, via_directory);
    assert_eq!(in_memory.to_f64_vec().unwrap(), vec![2.0, 4.0, 6.0, 8.0]);
}

#[tokio::test]
async fn test_directory_backed_checkpoint_drives_prediction() {
    let root = tempfile::tempdir().unwrap();
    let original = factor_checkpoint(2.0);
    original.to_directory(root.path()).unwrap();

    let loaded = Checkpoint::from_directory(root.path()).unwrap();
    assert_eq!(loaded.id(), original.id());

    let output = BatchPredictor::from_checkpoint::<ScalingPredictor>(loaded)
        .predict(Dataset::from_items([1.0, 2.0, 3.0, 4.0]), &PredictOptions::default())
        .await
        .unwrap();
    assert_eq!(output.to_f64_vec().unwrap(), vec![2.0, 4.0, 6.0, 8.0]);
}

#[tokio::test]
async fn test_bytes_round_trip_drives_prediction() {
    let original = factor_checkpoint(3.0);
    let restored = Checkpoint::from_bytes(&original.to_bytes().unwrap()).unwrap();
    let dataset = Dataset::from_items([1.0, 2.0]);

    let from_original = BatchPredictor::from_checkpoint::<ScalingPredictor>(original)
        .predict(dataset.clone(), &PredictOptions::default())
        .await
        .unwrap();
    let from_restored = BatchPredictor::from_checkpoint::<ScalingPredictor>(restored)
        .predict(dataset, &PredictOptions::default())
        .await
        .unwrap();

    assert_eq!(from_original, from_restored);
}

#[tokio::test]
async fn test_edited_payload_changes_predictions() {
    let checkpoint = factor_checkpoint(2.0);
    let mut payload = checkpoint.to_dict().unwrap();
    payload.insert("factor".to_string(), json!(10.0));
    let edited = Checkpoint::from_dict(payload);

    let output = BatchPredictor::from_checkpoint::<ScalingPredictor>(edited)
        .predict(Dataset::from_items([1.0, 2.0]), &PredictOptions::default())
        .await
        .unwrap();
    assert_eq!(output.to_f64_vec().unwrap(), vec![10.0, 20.0]);
}
