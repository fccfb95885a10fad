use super::*;
use tempfile::TempDir;

#[test]
fn oldest_entries_are_dropped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut history = ChatHistory::new(temp_dir.path().join("u.json"), 3);

    for i in 0..5 {
        history.push(Role::User, format!("сообщение {}", i));
    }

    assert_eq!(history.len(), 3);
    let contents: Vec<String> = history.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["сообщение 2", "сообщение 3", "сообщение 4"]);
}

#[test]
fn zero_max_length_keeps_one_entry() {
    let mut history = ChatHistory::new(PathBuf::from("unused.json"), 0);
    history.push(Role::User, "a");
    history.push(Role::Assistant, "b");
    assert_eq!(history.max_length(), 1);
    assert_eq!(history.messages(), vec![ChatMessage::assistant("b")]);
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("history").join("user.json");

    let mut history = ChatHistory::new(path.clone(), 10);
    history.push(Role::User, "Как оформить карту?");
    history.push(Role::Assistant, "Через приложение.");
    history.save().expect("Failed to save history");

    let loaded = ChatHistory::load(path, 10);
    assert_eq!(loaded.len(), 2);
    assert_eq!(
        loaded.entries().cloned().collect::<Vec<_>>(),
        history.entries().cloned().collect::<Vec<_>>()
    );
    assert_eq!(
        loaded.messages(),
        vec![
            ChatMessage::user("Как оформить карту?"),
            ChatMessage::assistant("Через приложение."),
        ]
    );
}

#[test]
fn load_truncates_to_max_length() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("user.json");

    let mut history = ChatHistory::new(path.clone(), 10);
    for i in 0..6 {
        history.push(Role::User, i.to_string());
    }
    history.save().expect("Failed to save history");

    let loaded = ChatHistory::load(path, 2);
    let contents: Vec<String> = loaded.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["4", "5"]);
}

#[test]
fn missing_file_gives_empty_history() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let history = ChatHistory::load(temp_dir.path().join("nobody.json"), 5);
    assert!(history.is_empty());
}

#[test]
fn corrupt_file_starts_fresh() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("user.json");
    fs::write(&path, "[{\"role\": \"robot\"").expect("Failed to write file");

    let mut history = ChatHistory::load(path.clone(), 5);
    assert!(history.is_empty());

    history.push(Role::User, "снова");
    history.save().expect("Failed to save history");
    assert_eq!(ChatHistory::load(path, 5).len(), 1);
}

#[test]
fn clear_removes_entries_and_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("user.json");

    let mut history = ChatHistory::new(path.clone(), 5);
    history.push(Role::User, "a");
    history.save().expect("Failed to save history");
    assert!(path.exists());

    history.clear().expect("Failed to clear history");
    assert!(history.is_empty());
    assert!(!path.exists());

    // clearing twice is fine
    history.clear().expect("Failed to clear history");
}

#[test]
fn file_names_are_sanitized() {
    assert_eq!(history_file_name("user-42_a"), "user-42_a.json");
    assert_eq!(history_file_name("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd.json");
    assert_eq!(history_file_name("Bob"), "%42ob.json");
    assert_eq!(history_file_name("Иван"), "%D0%98%D0%B2%D0%B0%D0%BD.json");
    assert_eq!(history_file_name(""), "%.json");
}

#[test]
fn distinct_users_get_distinct_files() {
    let ids = [
        "Иван", "Петр", "____", "_", "", "%", "%25", "bob", "Bob", "BOB", "a b", "a_b", "a/b",
    ];
    let mut names: Vec<String> = ids.iter().map(|id| history_file_name(id)).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), ids.len());

    // names never differ only by letter case
    let mut folded: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
    folded.sort();
    folded.dedup();
    assert_eq!(folded.len(), ids.len());
}

#[tokio::test]
async fn saved_history_is_not_visible_to_other_users() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let registry = HistoryRegistry::new(temp_dir.path().to_path_buf(), 5);
    let ivan = registry.get("Иван");
    {
        let mut history = ivan.lock().await;
        history.push(Role::User, "мой номер карты 1234");
        history.save().expect("Failed to save history");
    }

    let restarted = HistoryRegistry::new(temp_dir.path().to_path_buf(), 5);
    assert!(restarted.get("Петр").lock().await.is_empty());
    assert_eq!(
        restarted.get("Иван").lock().await.messages(),
        vec![ChatMessage::user("мой номер карты 1234")]
    );
}

#[tokio::test]
async fn registry_shares_one_history_per_user() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let registry = HistoryRegistry::new(temp_dir.path().to_path_buf(), 5);

    let first = registry.get("alice");
    let again = registry.get("alice");
    let other = registry.get("bob");

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));

    first.lock().await.push(Role::User, "hi");
    assert_eq!(again.lock().await.len(), 1);
    assert!(other.lock().await.is_empty());
    assert_eq!(
        first.lock().await.path(),
        temp_dir.path().join("alice.json").as_path()
    );
}

#[tokio::test]
async fn registry_loads_saved_history() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut saved = ChatHistory::new(temp_dir.path().join("carol.json"), 5);
    saved.push(Role::User, "сохранено");
    saved.save().expect("Failed to save history");

    let registry = HistoryRegistry::new(temp_dir.path().to_path_buf(), 5);
    let history = registry.get("carol");
    assert_eq!(
        history.lock().await.messages(),
        vec![ChatMessage::user("сохранено")]
    );
}

#[tokio::test]
async fn idle_histories_are_dropped_when_cache_is_full() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let registry = HistoryRegistry::new(temp_dir.path().to_path_buf(), 5).with_max_cached(2);

    {
        let first = registry.get("u1");
        let mut history = first.lock().await;
        history.push(Role::User, "первое");
        history.save().expect("Failed to save history");
    }
    drop(registry.get("u2"));
    assert_eq!(registry.cached(), 2);

    let held = registry.get("u3");
    assert_eq!(registry.cached(), 1);

    // a history in use survives pruning
    drop(registry.get("u4"));
    let again = registry.get("u3");
    assert!(Arc::ptr_eq(&held, &again));

    // dropped histories come back from disk
    assert_eq!(
        registry.get("u1").lock().await.messages(),
        vec![ChatMessage::user("первое")]
    );
}
