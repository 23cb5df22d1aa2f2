//! Object-transfer boundary.
//!
//! Values cross process boundaries through an [`ObjectStore`]: `put` encodes
//! a value and returns an opaque [`ObjectRef`], `get` decodes it back.
//! Encoding is a bincode frame around a self-describing JSON payload, so
//! payloads that carry `serde_json::Value` (checkpoints, descriptors,
//! params) survive the trip. This boundary is where the predictor transfer
//! ban is enforced: a type marked with
//! [`non_transferable!`](crate::non_transferable) fails `put` with
//! [`Error::PredictorNotSerializable`].

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::predictor::NOT_TRANSFERABLE_MSG;

/// Opaque handle to a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    id: Uuid,
}

impl ObjectRef {
    fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Identifier of the stored object.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Stored wire form: a type tag plus the JSON-encoded value.
#[derive(Serialize, Deserialize)]
struct Envelope {
    type_tag: String,
    payload: Vec<u8>,
}

fn encode_object<T: Serialize>(value: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(value).map_err(|e| {
        let message = e.to_string();
        if message.contains(NOT_TRANSFERABLE_MSG) {
            Error::PredictorNotSerializable(message)
        } else {
            Error::Serialization(message)
        }
    })?;
    let envelope = Envelope {
        type_tag: type_name::<T>().to_string(),
        payload,
    };
    let bytes = bincode::serialize(&envelope).map_err(|e| Error::serialization(e.to_string()))?;
    Ok(Bytes::from(bytes))
}

fn decode_object<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| Error::serialization(e.to_string()))?;
    let expected = type_name::<T>();
    if envelope.type_tag != expected {
        return Err(Error::serialization(format!(
            "stored object has type {}, requested {}",
            envelope.type_tag, expected
        )));
    }
    Ok(serde_json::from_slice(&envelope.payload)?)
}

/// Transport-agnostic object store.
///
/// Implementations move bytes; the typed `put`/`get` wrappers handle the
/// envelope encoding and are where serialization failures (including the
/// predictor transfer ban) surface, before any bytes move.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an encoded object and hand back its ref.
    async fn put_bytes(&self, bytes: Bytes) -> Result<ObjectRef>;

    /// Fetch the encoded object behind a ref.
    async fn get_bytes(&self, object: &ObjectRef) -> Result<Bytes>;

    /// Whether the store currently holds this ref.
    async fn contains(&self, object: &ObjectRef) -> Result<bool>;

    /// Remove an object. Fails with [`Error::ObjectNotFound`] if absent.
    async fn delete(&self, object: &ObjectRef) -> Result<()>;

    /// Encode and store a value.
    async fn put<T>(&self, value: &T) -> Result<ObjectRef>
    where
        T: Serialize + Sync,
        Self: Sized,
    {
        let bytes = encode_object(value)?;
        self.put_bytes(bytes).await
    }

    /// Fetch and decode a value of the type it was stored as.
    async fn get<T>(&self, object: &ObjectRef) -> Result<T>
    where
        T: DeserializeOwned,
        Self: Sized,
    {
        let bytes = self.get_bytes(object).await?;
        decode_object(&bytes)
    }
}

/// Process-local object store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<Uuid, Bytes>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put_bytes(&self, bytes: Bytes) -> Result<ObjectRef> {
        let object = ObjectRef::new();
        debug!(object_id = %object.id(), size = bytes.len(), "stored object");
        self.objects.write().insert(object.id(), bytes);
        Ok(object)
    }

    async fn get_bytes(&self, object: &ObjectRef) -> Result<Bytes> {
        self.objects
            .read()
            .get(&object.id())
            .cloned()
            .ok_or(Error::ObjectNotFound(object.id()))
    }

    async fn contains(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self.objects.read().contains_key(&object.id()))
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        self.objects
            .write()
            .remove(&object.id())
            .map(|_| ())
            .ok_or(Error::ObjectNotFound(object.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::predictor::{LinearPredictor, PredictorDescriptor};
    use serde_json::json;

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let store = InMemoryStore::new();
        let checkpoint = Checkpoint::from_value(json!({ "factor": 2.0 })).unwrap();

        let object = store.put(&checkpoint).await.unwrap();
        assert!(store.contains(&object).await.unwrap());

        let restored: Checkpoint = store.get(&object).await.unwrap();
        assert_eq!(restored.id(), checkpoint.id());
        assert_eq!(restored.to_dict().unwrap(), checkpoint.to_dict().unwrap());
    }

    #[tokio::test]
    async fn test_descriptor_round_trip() {
        let store = InMemoryStore::new();
        let descriptor = PredictorDescriptor::new(LinearPredictor::KIND);

        let object = store.put(&descriptor).await.unwrap();
        let restored: PredictorDescriptor = store.get(&object).await.unwrap();
        assert_eq!(restored, descriptor);
    }

    #[tokio::test]
    async fn test_predictor_instance_is_rejected() {
        let store = InMemoryStore::new();
        let predictor = LinearPredictor::new(2.0, 0.0);

        let err = store.put(&predictor).await.unwrap_err();
        assert!(err.is_not_serializable());
        // Nothing may be stored by a failed put.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_type_tag_mismatch_is_an_error() {
        let store = InMemoryStore::new();
        let object = store.put(&json!({ "factor": 2.0 })).await.unwrap();

        let result: Result<Checkpoint> = store.get(&object).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_delete_and_missing_refs() {
        let store = InMemoryStore::new();
        let object = store.put(&json!(1)).await.unwrap();

        store.delete(&object).await.unwrap();
        assert!(!store.contains(&object).await.unwrap());
        assert!(matches!(
            store.get_bytes(&object).await,
            Err(Error::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.delete(&object).await,
            Err(Error::ObjectNotFound(_))
        ));
    }
}
