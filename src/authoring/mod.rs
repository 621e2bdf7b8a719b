// src/authoring/mod.rs

//! Test authoring: parse a document, collect its images, publish it.

pub mod document;
pub mod draft;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use uuid::Uuid;

use crate::{
    error::AppError,
    models::test::Test,
    store::Store,
    upload::{ImageUpload, UploadPipeline},
};

pub use document::{DocumentError, TestDocument, sample_document};
pub use draft::{Draft, DraftError, DraftView, Slot};

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::NotFound => AppError::NotFound(err.to_string()),
            DraftError::Incomplete(_) => AppError::Conflict(err.to_string()),
            DraftError::BadSlot(_)
            | DraftError::UnknownQuestion(_)
            | DraftError::UnknownOption { .. }
            | DraftError::SlotNotFlagged(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

/// Unpublished drafts, each visible only to the admin who created it.
#[derive(Clone, Default)]
pub struct DraftRegistry {
    drafts: Arc<Mutex<HashMap<Uuid, Draft>>>,
}

impl DraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_draft<T>(
        &self,
        id: Uuid,
        owner: i64,
        f: impl FnOnce(&mut Draft) -> Result<T, DraftError>,
    ) -> Result<T, DraftError> {
        let mut drafts = self.drafts.lock().unwrap_or_else(|p| p.into_inner());
        let draft = drafts
            .get_mut(&id)
            .filter(|d| d.owner == owner)
            .ok_or(DraftError::NotFound)?;
        f(draft)
    }

    pub fn create(&self, owner: i64, raw: &str) -> Result<DraftView, DocumentError> {
        let document = TestDocument::parse(raw)?;
        let draft = Draft::new(owner, document);
        let view = draft.view();
        self.drafts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(draft.id, draft);
        tracing::info!(draft = %view.id, owner, missing = view.missing_slots.len(), "Draft created");
        Ok(view)
    }

    pub fn get(&self, id: Uuid, owner: i64) -> Result<DraftView, DraftError> {
        self.with_draft(id, owner, |d| Ok(d.view()))
    }

    pub fn discard(&self, id: Uuid, owner: i64) -> Result<(), DraftError> {
        let mut drafts = self.drafts.lock().unwrap_or_else(|p| p.into_inner());
        match drafts.get(&id) {
            Some(d) if d.owner == owner => {
                drafts.remove(&id);
                Ok(())
            }
            _ => Err(DraftError::NotFound),
        }
    }

    /// Uploads one image and stores the reference in its slot.
    ///
    /// The upload runs without holding the registry lock, so uploads to
    /// different slots proceed independently. Two uploads racing for the same
    /// slot both succeed and the later one to finish is kept.
    pub async fn attach_image(
        &self,
        id: Uuid,
        owner: i64,
        slot: Slot,
        image: ImageUpload,
        pipeline: &UploadPipeline,
    ) -> Result<DraftView, AppError> {
        let folder = self.with_draft(id, owner, |d| {
            d.check_slot(&slot)?;
            Ok(d.folder_for(slot.question_id()))
        })?;

        let uploaded = pipeline.upload(image, &folder).await?;

        let view = self.with_draft(id, owner, |d| {
            d.attach(&slot, &uploaded)?;
            Ok(d.view())
        })?;
        tracing::info!(draft = %id, %slot, "Image attached");
        Ok(view)
    }

    /// Publishes a complete draft.
    ///
    /// The draft leaves the registry while the store write is in flight, so a
    /// concurrent publish or upload sees it as gone. It is put back if the
    /// store rejects the test.
    pub async fn publish(&self, id: Uuid, owner: i64, store: &dyn Store) -> Result<Test, AppError> {
        let (draft, new_test) = {
            let mut drafts = self.drafts.lock().unwrap_or_else(|p| p.into_inner());
            let new_test = drafts
                .get(&id)
                .filter(|d| d.owner == owner)
                .ok_or(DraftError::NotFound)?
                .to_new_test(owner)?;
            let draft = drafts.remove(&id).ok_or(DraftError::NotFound)?;
            (draft, new_test)
        };

        let test = match store.create_test(new_test).await {
            Ok(test) => test,
            Err(e) => {
                tracing::error!(draft = %id, "Publish failed, draft kept: {}", e);
                self.drafts
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(id, draft);
                return Err(e.into());
            }
        };

        tracing::info!(draft = %id, test_id = test.id, "Draft published");
        Ok(test)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{
            result::{NewResult, TestResult},
            test::NewTest,
            user::{NewUser, User},
        },
        store::{MemoryStore, StoreError, StoreResult},
        upload::{ImageHost, UploadError, UploadedImage},
    };

    /// Delegates to a `MemoryStore`; test inserts take a while and can fail.
    struct SlowStore {
        inner: MemoryStore,
        fail_create: AtomicBool,
    }

    impl SlowStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_create: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Store for SlowStore {
        async fn create_user(&self, user: NewUser) -> StoreResult<User> {
            self.inner.create_user(user).await
        }
        async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.get_user_by_email(email).await
        }
        async fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
            self.inner.get_user_by_id(id).await
        }
        async fn get_all_users(&self) -> StoreResult<Vec<User>> {
            self.inner.get_all_users().await
        }
        async fn create_test(&self, test: NewTest) -> StoreResult<Test> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.create_test(test).await
        }
        async fn get_all_tests(&self) -> StoreResult<Vec<Test>> {
            self.inner.get_all_tests().await
        }
        async fn get_test_by_id(&self, id: i64) -> StoreResult<Option<Test>> {
            self.inner.get_test_by_id(id).await
        }
        async fn submit_result(&self, result: NewResult) -> StoreResult<TestResult> {
            self.inner.submit_result(result).await
        }
        async fn get_user_results(&self, user_id: i64) -> StoreResult<Vec<TestResult>> {
            self.inner.get_user_results(user_id).await
        }
        async fn get_all_results(&self) -> StoreResult<Vec<TestResult>> {
            self.inner.get_all_results().await
        }
    }

    const PLAIN_DOCUMENT: &str = r#"{
        "testTitle": "No Images",
        "duration": 15,
        "questions": [
            { "id": 1, "question": "1 + 1?", "options": { "A": "2", "B": "3" },
              "correctAnswer": "A", "marks": 2 }
        ]
    }"#;

    struct FakeHost;

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(&self, _image: ImageUpload, folder: &str) -> Result<UploadedImage, UploadError> {
            Ok(UploadedImage {
                url: format!("https://cdn.example.com/{}/img.png", folder),
                public_id: format!("{}/img", folder),
                width: 10,
                height: 10,
            })
        }
    }

    fn png() -> ImageUpload {
        ImageUpload {
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0],
        }
    }

    #[tokio::test]
    async fn drafts_are_private_to_their_owner() {
        let registry = DraftRegistry::new();
        let view = registry.create(1, &sample_document().to_string()).unwrap();
        assert_eq!(registry.get(view.id, 2).unwrap_err(), DraftError::NotFound);
        assert!(registry.get(view.id, 1).is_ok());
    }

    #[tokio::test]
    async fn publish_is_blocked_until_images_are_attached() {
        let registry = DraftRegistry::new();
        let store = MemoryStore::new();
        let pipeline = UploadPipeline::new(Arc::new(FakeHost));
        let view = registry.create(1, &sample_document().to_string()).unwrap();

        let err = registry.publish(view.id, 1, &store).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        for slot in view.missing_slots {
            registry
                .attach_image(view.id, 1, slot, png(), &pipeline)
                .await
                .unwrap();
        }

        let test = registry.publish(view.id, 1, &store).await.unwrap();
        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.created_by, Some(1));
        assert_eq!(
            test.questions[0].question_image_url.as_deref(),
            Some("https://cdn.example.com/test_Sample_Physics_Test/q1/img.png")
        );
        assert_eq!(registry.get(view.id, 1).unwrap_err(), DraftError::NotFound);
    }

    #[tokio::test]
    async fn failed_upload_leaves_draft_untouched() {
        let registry = DraftRegistry::new();
        let pipeline = UploadPipeline::unconfigured();
        let view = registry.create(1, &sample_document().to_string()).unwrap();

        let err = registry
            .attach_image(view.id, 1, Slot::Question { question_id: 1 }, png(), &pipeline)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadGateway(_)));
        assert_eq!(registry.get(view.id, 1).unwrap().missing_slots.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_publishes_store_one_test() {
        let registry = DraftRegistry::new();
        let store = SlowStore::new();
        let view = registry.create(1, PLAIN_DOCUMENT).unwrap();

        let (first, second) = tokio::join!(
            registry.publish(view.id, 1, &store),
            registry.publish(view.id, 1, &store)
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::NotFound(_))));
        assert_eq!(store.get_all_tests().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn draft_is_unavailable_while_publishing_and_restored_on_failure() {
        let registry = DraftRegistry::new();
        let store = SlowStore::new();
        store.fail_create.store(true, Ordering::SeqCst);
        let view = registry.create(1, PLAIN_DOCUMENT).unwrap();

        let publishing = registry.publish(view.id, 1, &store);
        let checking = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registry.get(view.id, 1)
        };
        let (published, during) = tokio::join!(publishing, checking);

        assert_eq!(during.unwrap_err(), DraftError::NotFound);
        assert!(matches!(published, Err(AppError::InternalServerError(_))));
        assert!(store.get_all_tests().await.unwrap().is_empty());

        // Back in the registry and publishable once the store recovers.
        assert!(registry.get(view.id, 1).is_ok());
        store.fail_create.store(false, Ordering::SeqCst);
        let test = registry.publish(view.id, 1, &store).await.unwrap();
        assert_eq!(test.title, "No Images");
        assert_eq!(registry.get(view.id, 1).unwrap_err(), DraftError::NotFound);
    }
}
