use super::*;

struct BrokenBackend;

impl SlotBackend for BrokenBackend {
    fn get(&self, _key: &str) -> Result<Option<String>, SessionError> {
        Err(SessionError::Storage("disk gone".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), SessionError> {
        Err(SessionError::Storage("disk gone".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), SessionError> {
        Err(SessionError::Storage("disk gone".into()))
    }
}

// =============================================================================
// TokenStore: slots
// =============================================================================

#[test]
fn get_token_empty_store_is_none() {
    let store = TokenStore::in_memory();
    assert_eq!(store.get_token(), None);
    assert_eq!(store.token_slot(), None);
}

#[test]
fn set_token_durable_then_ephemeral_keeps_only_latest() {
    let durable = Arc::new(MemoryBackend::new());
    let store = TokenStore::new(durable.clone(), Arc::new(MemoryBackend::new()));

    store.set_token("A", Slot::Durable).unwrap();
    store.set_token("B", Slot::Ephemeral).unwrap();

    assert_eq!(store.get_token().as_deref(), Some("B"));
    assert_eq!(store.token_slot(), Some(Slot::Ephemeral));
    assert_eq!(durable.get(AUTH_TOKEN_KEY).unwrap(), None);
}

#[test]
fn set_token_ephemeral_then_durable_clears_ephemeral() {
    let ephemeral = Arc::new(MemoryBackend::new());
    let store = TokenStore::new(Arc::new(MemoryBackend::new()), ephemeral.clone());

    store.set_token("A", Slot::Ephemeral).unwrap();
    store.set_token("B", Slot::Durable).unwrap();

    assert_eq!(store.get_token().as_deref(), Some("B"));
    assert_eq!(ephemeral.get(AUTH_TOKEN_KEY).unwrap(), None);
}

#[test]
fn set_token_is_idempotent() {
    let store = TokenStore::in_memory();
    store.set_token("A", Slot::Durable).unwrap();
    store.set_token("A", Slot::Durable).unwrap();
    assert_eq!(store.get_token().as_deref(), Some("A"));
    assert_eq!(store.token_slot(), Some(Slot::Durable));
}

#[test]
fn get_token_prefers_durable_slot() {
    let durable = Arc::new(MemoryBackend::new());
    let ephemeral = Arc::new(MemoryBackend::new());
    // Bypass set_token to simulate a store written by an older build.
    durable.set(AUTH_TOKEN_KEY, "D").unwrap();
    ephemeral.set(AUTH_TOKEN_KEY, "E").unwrap();
    let store = TokenStore::new(durable, ephemeral);
    assert_eq!(store.get_token().as_deref(), Some("D"));
}

#[test]
fn empty_value_counts_as_absent() {
    let durable = Arc::new(MemoryBackend::new());
    durable.set(AUTH_TOKEN_KEY, "").unwrap();
    let store = TokenStore::new(durable, Arc::new(MemoryBackend::new()));
    assert_eq!(store.get_token(), None);
}

// =============================================================================
// TokenStore: clear
// =============================================================================

#[test]
fn clear_is_idempotent() {
    let store = TokenStore::in_memory();
    store.set_token("A", Slot::Durable).unwrap();
    store.clear();
    let once = store.get_token();
    store.clear();
    assert_eq!(once, None);
    assert_eq!(store.get_token(), None);
}

#[test]
fn clear_removes_cached_user() {
    let durable = Arc::new(MemoryBackend::new());
    durable.set(CACHED_USER_KEY, "{}").unwrap();
    let store = TokenStore::new(durable.clone(), Arc::new(MemoryBackend::new()));
    store.clear();
    assert_eq!(durable.get(CACHED_USER_KEY).unwrap(), None);
}

#[test]
fn clear_never_fails_on_broken_backend() {
    let store = TokenStore::new(Arc::new(BrokenBackend), Arc::new(BrokenBackend));
    store.clear();
    assert_eq!(store.get_token(), None);
}

#[test]
fn set_token_surfaces_backend_errors() {
    let store = TokenStore::new(Arc::new(BrokenBackend), Arc::new(MemoryBackend::new()));
    assert!(matches!(store.set_token("A", Slot::Ephemeral), Err(SessionError::Storage(_))));
}

// =============================================================================
// Identity hints
// =============================================================================

#[test]
fn hints_round_trip_and_clear() {
    let store = TokenStore::in_memory();
    let hints = IdentityHints {
        first_name: Some("Ana".into()),
        picture: Some("/uploads/ana.png".into()),
        user_id: Some("1".into()),
        admin: None,
    };
    store.set_hints(&hints);
    assert_eq!(store.hints(), hints);

    store.clear_hints();
    assert!(store.hints().is_empty());
}

#[test]
fn clear_keeps_hints() {
    let store = TokenStore::in_memory();
    store.set_hints(&IdentityHints { first_name: Some("Ana".into()), ..IdentityHints::default() });
    store.clear();
    assert_eq!(store.hints().first_name.as_deref(), Some("Ana"));
}

// =============================================================================
// FileBackend
// =============================================================================

#[test]
fn file_backend_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("durable.json");

    let first = FileBackend::new(&path);
    first.set(AUTH_TOKEN_KEY, "persisted").unwrap();

    let second = FileBackend::new(&path);
    assert_eq!(second.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("persisted"));

    second.remove(AUTH_TOKEN_KEY).unwrap();
    assert_eq!(first.get(AUTH_TOKEN_KEY).unwrap(), None);
}

#[test]
fn file_backend_missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(dir.path().join("absent.json"));
    assert_eq!(backend.get(AUTH_TOKEN_KEY).unwrap(), None);
    backend.remove(AUTH_TOKEN_KEY).unwrap();
    assert!(!backend.path().exists());
}

#[test]
fn file_backend_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.json");
    std::fs::write(&path, b"{not json").unwrap();
    let backend = FileBackend::new(&path);
    assert!(matches!(backend.get(AUTH_TOKEN_KEY), Err(SessionError::Decode(_))));
}
