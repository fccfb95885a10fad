use super::*;
use std::fs;
use tempfile::TempDir;
use wiremock::MockServer;

/// Config dir with a knowledge base whose service points at `server`
fn workspace(server: &MockServer) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        temp_dir.path().join("kb.csv"),
        "Основная категория,Подкатегория,Пример вопроса,Приоритет,Целевая аудитория,Шаблонный ответ\n\
         Карты,Дебетовые,Как оформить карту?,,,Через приложение.\n",
    )
    .expect("Failed to write csv");

    let mut config = Config::load(temp_dir.path()).expect("default config");
    config.service.protocol = "http".to_string();
    config.service.host = server.address().ip().to_string();
    config.service.port = server.address().port();
    config.save().expect("Failed to save config");
    temp_dir
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .len()
}

#[test]
fn overrides_replace_configured_values() {
    let retrieval = RetrievalConfig::default();
    let overrides = RetrievalOverrides {
        top_k: Some(7),
        category_weight: Some(0.5),
        question_weight: Some(0.5),
        ..RetrievalOverrides::default()
    };

    let merged = overrides.apply(&retrieval).expect("valid overrides");
    assert_eq!(merged.top_k, 7);
    assert_eq!(merged.search_params().top_k, 7);
    assert!((merged.match_params().category_weight - 0.5).abs() < f32::EPSILON);
    assert_eq!(merged.top_categories, retrieval.top_categories);
    assert!((merged.min_similarity - retrieval.min_similarity).abs() < f32::EPSILON);
}

#[test]
fn no_overrides_keep_configuration() {
    let retrieval = RetrievalConfig::default();
    let merged = RetrievalOverrides::default()
        .apply(&retrieval)
        .expect("default config is valid");
    assert_eq!(merged, retrieval);
}

#[test]
fn invalid_overrides_are_rejected() {
    let retrieval = RetrievalConfig::default();

    let nan_weight = RetrievalOverrides {
        category_weight: Some(f32::NAN),
        ..RetrievalOverrides::default()
    };
    assert!(matches!(
        nan_weight.apply(&retrieval),
        Err(ConfigError::InvalidWeight {
            name: "category_weight",
            ..
        })
    ));

    let negative_weight = RetrievalOverrides {
        question_weight: Some(-1.0),
        ..RetrievalOverrides::default()
    };
    assert!(matches!(
        negative_weight.apply(&retrieval),
        Err(ConfigError::InvalidWeight {
            name: "question_weight",
            ..
        })
    ));

    let no_results = RetrievalOverrides {
        top_k: Some(0),
        ..RetrievalOverrides::default()
    };
    assert!(matches!(
        no_results.apply(&retrieval),
        Err(ConfigError::InvalidCandidateCount { name: "top_k", .. })
    ));

    let out_of_range = RetrievalOverrides {
        min_similarity: Some(1.5),
        ..RetrievalOverrides::default()
    };
    assert!(matches!(
        out_of_range.apply(&retrieval),
        Err(ConfigError::InvalidThreshold {
            name: "min_similarity",
            ..
        })
    ));
}

#[tokio::test]
async fn blank_query_is_rejected_by_search_and_match() {
    let server = MockServer::start().await;
    let temp_dir = workspace(&server);

    let err = search_knowledge_base(temp_dir.path(), "   ", RetrievalOverrides::default())
        .await
        .expect_err("blank search query");
    assert!(matches!(
        err.downcast_ref::<SupportError>(),
        Some(SupportError::EmptyQuery)
    ));

    let err = match_knowledge_base(temp_dir.path(), "\n\t", RetrievalOverrides::default())
        .await
        .expect_err("blank match query");
    assert!(matches!(
        err.downcast_ref::<SupportError>(),
        Some(SupportError::EmptyQuery)
    ));

    assert_eq!(request_count(&server).await, 0);
    assert!(!temp_dir.path().join("vector_db.json").exists());
}

#[tokio::test]
async fn invalid_weight_fails_before_loading_knowledge_base() {
    let server = MockServer::start().await;
    let temp_dir = workspace(&server);

    let overrides = RetrievalOverrides {
        category_weight: Some(f32::NAN),
        ..RetrievalOverrides::default()
    };
    let err = match_knowledge_base(temp_dir.path(), "Как оформить карту?", overrides)
        .await
        .expect_err("NaN weight");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidWeight { .. })
    ));

    let overrides = RetrievalOverrides {
        top_k: Some(0),
        ..RetrievalOverrides::default()
    };
    let err = search_knowledge_base(temp_dir.path(), "Как оформить карту?", overrides)
        .await
        .expect_err("zero top_k");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidCandidateCount { .. })
    ));

    assert_eq!(request_count(&server).await, 0);
}
