mod common;

use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{json, requires_bearer, status, tokens, FakeBackend, BASE_URL};
use shared::crypto::KeyRing;
use shared::token_store::EncryptedFilePersistence;
use shared::{ClientConfig, ErrorKind, Repository, TokenStore};

fn file_store(path: &std::path::Path) -> TokenStore {
    let keys = Arc::new(KeyRing::from_key(1, &[7u8; 32]).unwrap());
    TokenStore::open(EncryptedFilePersistence::new(path, keys).unwrap()).unwrap()
}

fn repository(backend: Arc<FakeBackend>, store: Arc<TokenStore>) -> Arc<Repository> {
    Arc::new(Repository::build(backend, store, &ClientConfig::new(BASE_URL)).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expiry_refreshes_once_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth_prefs.bin");
    let store = Arc::new(file_store(&path));
    store.save_tokens("acc-0", "ref-0").unwrap();

    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = refreshes.clone();
    let backend = Arc::new(
        FakeBackend::new()
            .with_latency(Duration::from_millis(20))
            .on("/api/auth/refresh", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                tokens("acc-1", "ref-1")
            })
            .on(
                "/api/admin/stats",
                requires_bearer("acc-1", || json(200, serde_json::json!({"users": 5}))),
            ),
    );
    let repo = repository(backend.clone(), store.clone());

    let calls: Vec<_> = (0..6)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.stats().await })
        })
        .collect();
    for call in calls {
        let stats = call.await.unwrap().unwrap();
        assert_eq!(stats["users"], 5);
    }

    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    // The rotated pair survived on disk.
    drop(repo);
    let reopened = file_store(&path);
    let session = reopened.session().expect("persisted session");
    assert_eq!(session.access_token().expose_secret(), "acc-1");
    assert_eq!(session.refresh_token().expose_secret(), "ref-1");
}

#[tokio::test]
async fn refused_refresh_clears_disk_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth_prefs.bin");
    let store = Arc::new(file_store(&path));
    store.save_tokens("acc-0", "ref-0").unwrap();

    let backend = Arc::new(
        FakeBackend::new()
            .on("/api/auth/refresh", |_| status(401))
            .on("/api/users/7/safe-foods", |_| status(401)),
    );
    let repo = repository(backend.clone(), store.clone());

    let failure = repo.safe_foods(7).await.unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Authentication);
    assert_eq!(backend.calls_to("/api/users/7/safe-foods"), 1);
    assert!(!store.has_session());
    assert!(file_store(&path).session().is_none());
}

#[tokio::test]
async fn login_then_logout_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth_prefs.bin");
    let store = Arc::new(file_store(&path));

    let backend = Arc::new(
        FakeBackend::new()
            .on("/api/auth/login", |_| tokens("acc-1", "ref-1"))
            .on("/api/auth/logout", |_| status(204)),
    );
    let repo = repository(backend.clone(), store.clone());

    repo.login("ana@example.com", "secret123").await.unwrap();
    assert!(file_store(&path).has_session());

    repo.logout().await.unwrap();
    assert!(!store.has_session());
    assert!(!file_store(&path).has_session());

    let logout = backend.last_call_to("/api/auth/logout").unwrap();
    let body: serde_json::Value = serde_json::from_slice(logout.body().unwrap()).unwrap();
    assert_eq!(body["refreshToken"], "ref-1");
}
